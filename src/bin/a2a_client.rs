//! A2A 客户端：把一篇草稿发给远端 Reviewer，打印审校后的文章
//!
//! 用法：a2a-client [server-url] [draft.md]

use std::path::PathBuf;

use anyhow::Context;
use content_pipeline::{
    a2a::{A2aClient, TaskState},
    config::load_config,
    observability,
};

const SAMPLE_DRAFT: &str = r#"# Getting Started with Azure Functions

Azure Functions is a servless compute service that lets you run code without managing servers.

## Key Features
- Event-driven execution
- Multiple language support (Python, C#, JavaScript, Java)
- Pay only for compute time consumed
- Integrates with Azure services and third-party tools

## Quick Start
To create your first function:
```python
import azure.functions as func

app = func.FunctionApp()

@app.route(route="hello")
def hello(req: func.HttpRequest) -> func.HttpResponse:
    name = req.params.get("name", "World")
    return func.HttpResponse(f"Hello, {name}!")
```

Deploy using the Azure CLI:
```bash
func azure functionapp publish <app-name>
```

## Conclusion
Azure Functions makes it easy to build event-driven applications in the cloud.
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config = load_config(None).unwrap_or_default();
    observability::init(&config.telemetry);

    let server_url = args.next().unwrap_or_else(|| config.a2a.public_url());
    let draft = match args.next().map(PathBuf::from) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read draft {}", path.display()))?,
        None => SAMPLE_DRAFT.to_string(),
    };

    println!("{}", "=".repeat(50));
    println!("A2A Client: sending draft to remote Reviewer agent");
    println!("{}\n", "=".repeat(50));
    println!("Connecting to: {}", server_url);

    let client = A2aClient::new(server_url);
    let card = client.agent_card().await.context("Failed to fetch agent card")?;
    println!("Remote agent: {} ({})", card.name, card.description);
    println!("Sending draft article for review...\n");

    let task = client
        .send_text(format!("Please review and polish this article:\n\n{}", draft))
        .await
        .context("A2A request failed")?;

    println!("\n{}", "-".repeat(50));
    match task.status.state {
        TaskState::Completed => {
            println!("Reviewed article:\n");
            println!("{}", task.artifact_text());
            println!("\n{}", "=".repeat(50));
            println!("Done! The remote agent reviewed the article via A2A protocol.");
            Ok(())
        }
        other => {
            let reason = task
                .status
                .message
                .map(|m| m.text())
                .unwrap_or_default();
            anyhow::bail!("Task {} ended as {:?}: {}", task.id, other, reason)
        }
    }
}
