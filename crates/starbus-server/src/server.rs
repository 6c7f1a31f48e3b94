//! Listener and device host.

use std::net::SocketAddr;
use std::sync::Arc;

use starbus_core::{Bus, Result};
use starbus_devices::{BaseDevice, ConfigStore, DeviceDescriptor, Driver, LockManager};
use starbus_wire::Encoder;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::session::Session;

/// The bus server: accepts client connections and hosts devices.
#[derive(Clone)]
pub struct Server {
    bus: Bus,
    encoder: Arc<Encoder>,
    config: ConfigStore,
    locks: Arc<LockManager>,
}

impl Server {
    pub fn new(bus: Bus, config: ConfigStore) -> Self {
        Self {
            bus,
            encoder: Arc::new(Encoder::new()),
            config,
            locks: Arc::new(LockManager::new(LockManager::default_dir())),
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Build a device around `driver` and attach it to this server's bus,
    /// wired to the server's configuration store and lock manager.
    pub async fn attach_device(
        &self,
        descriptor: DeviceDescriptor,
        driver: Arc<dyn Driver>,
    ) -> Result<BaseDevice> {
        let device = BaseDevice::new(
            descriptor,
            driver,
            self.bus.clone(),
            self.config.clone(),
            Arc::clone(&self.locks),
        );
        device.attach_to_bus().await?;
        Ok(device)
    }

    /// Bind and serve forever.
    pub async fn run(&self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening");
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "client connected");
            let session = Session::new(self.bus.clone(), Arc::clone(&self.encoder));
            tokio::spawn(async move {
                match session.run(stream).await {
                    Ok(()) => debug!(%peer, "client disconnected"),
                    Err(e) => debug!(%peer, error = %e, "session ended"),
                }
            });
        }
    }
}
