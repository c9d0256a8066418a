use std::sync::Arc;
use std::thread;
use std::time::Instant;

use json_line_layout::{record::LogEvent, ConfigurerRegistry, LayoutConfig};
use tracing::Level;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let layout = Arc::new(LayoutConfig::new().start(&ConfigurerRegistry::new())?);

    let threads: u64 = 8;
    let per_thread: u64 = 100_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let layout = Arc::clone(&layout);
            thread::spawn(move || {
                let mut bytes = 0usize;
                for i in 0..per_thread {
                    let event = LogEvent::new(i as i64)
                        .with_thread(format!("worker-{}", t))
                        .with_level(Level::INFO)
                        .with_message("load test");
                    bytes += layout.layout(&event).map(|line| line.len()).unwrap_or(0);
                }
                bytes
            })
        })
        .collect();

    let mut total_bytes = 0usize;
    for handle in handles {
        total_bytes += handle.join().map_err(|_| "worker panicked")?;
    }

    let n = threads * per_thread;
    let elapsed = start.elapsed();
    println!("laid out {} events ({} bytes) in {:?} (~{:.0} ev/s)",
        n,
        total_bytes,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
