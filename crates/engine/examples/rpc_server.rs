use std::time::Duration;

use rpc_engine::http::HttpListenCommand;
use rpc_engine::{Engine, EngineConfig};
use rpc_http::net::ListenSocket;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

// curl -s http://127.0.0.1:6800/rpc \
//   -d '{"jsonrpc":"2.0","id":"1","method":"aria2.addUri","params":[["http://example.org/file"]]}'
// curl -s -d '{"jsonrpc":"2.0","id":"2","method":"aria2.tellActive"}' http://127.0.0.1:6800/rpc
// curl -s -d '{"jsonrpc":"2.0","id":"3","method":"aria2.shutdown"}' http://127.0.0.1:6800/rpc
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 6800, "start listening");
    let listener = match ListenSocket::bind("127.0.0.1:6800").await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let config = EngineConfig::builder().select_timeout(Duration::from_millis(500)).build();
    let mut engine = Engine::new(config);
    let cuid = engine.new_cuid();
    let command = HttpListenCommand::new(cuid, listener, &engine);
    engine.schedule_next(Box::new(command));

    engine.run().await;
    info!("server stopped");
}
