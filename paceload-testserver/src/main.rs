use std::net::SocketAddr;
use std::time::Duration;

use paceload_testserver::{TestServerOptions, TestServerStats};
use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = TestServerOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--fail" => {
                let prefix = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--fail requires a path prefix, e.g. /jobs"))?;
                options = options.fail_prefix(prefix);
            }
            "--delay" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--delay requires milliseconds, e.g. 25"))?;
                options = options.delay(Duration::from_millis(ms.parse()?));
            }
            "-h" | "--help" => {
                eprintln!(
                    "paceload-testserver\n\nUSAGE:\n  paceload-testserver [--bind 127.0.0.1:0] [--fail <path-prefix>]... [--delay <ms>]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = paceload_testserver::router(TestServerStats::default(), options);

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
