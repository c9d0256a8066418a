use std::error::Error;
use std::fmt;

use tracing::{error, info};
use json_line_layout::extras::{run_with_extras, run_with_extras_async};
use json_line_layout::init::init_json_logging;

#[derive(Debug)]
struct ReportError;

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "report generation failed")
    }
}

impl Error for ReportError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_json_logging()?;

    run_with_extras(|extras| {
        extras.insert("userId", "3af2fbd7-ab40-4803-aaa1-1330467184dd");
        extras.insert("processKey", "Module:generating-report");
        extras.insert_serialized("nested", &serde_json::json!({"number": 123.6, "boolean": true}))?;

        info!("Info message");
        let err = ReportError;
        error!(error = &err as &(dyn Error + 'static), "We have problem");
        Ok::<_, serde_json::Error>(())
    })?;

    // Extras follow the task across worker threads.
    let handle = tokio::spawn(run_with_extras_async(|extras| async move {
        extras.insert("requestId", "r-1");
        tokio::task::yield_now().await;
        info!("handled request");
    }));
    handle.await?;

    info!("outside any scope");
    Ok(())
}
