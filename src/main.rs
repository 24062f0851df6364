use tokio_util::sync::CancellationToken;

mod api;
mod config;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("webm_stream", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    webm_stream::init(&webm_stream::LibraryConfig::default()).unwrap_or_else(|e| {
        eprintln!("Error initializing webm_stream: {}", e);
        std::process::exit(1);
    });

    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    let server = api::start_api_server(cancel_clone);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    // let open streams write their trailers
    if let Err(e) = server.await {
        log::error!("API server task failed: {}", e);
    }
    std::process::exit(0);
}
