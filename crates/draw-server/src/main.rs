use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = SocketAddr::from(([127, 0, 0, 1], 8000));
    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("drawing API listening on {address}");
    axum::serve(listener, draw_server::app()).await?;
    Ok(())
}
