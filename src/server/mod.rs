pub mod api;

use std::error::Error;
use std::sync::Arc;

use log::info;

use crate::service::ChatService;

pub struct Server {
    addr: String,
    service: Arc<ChatService>,
}

impl Server {
    pub fn new(addr: String, service: Arc<ChatService>) -> Self {
        Self { addr, service }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::build_router(self.service.clone());
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("HTTP server listening on: http://{}", self.addr);
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
