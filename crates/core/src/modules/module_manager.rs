use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

type StatusMap = HashMap<ModuleId, HashMap<String, String>>;

/// Registry and lifecycle owner for control-surface modules.
///
/// Every module runs in its own task with its own event channel; the
/// manager is the only thing that marshals host events onto those tasks.
pub struct ModuleManager {
    modules: HashMap<ModuleId, Box<dyn AsyncModule>>,
    module_handles: HashMap<ModuleId, JoinHandle<()>>,
    module_senders: HashMap<ModuleId, mpsc::Sender<ModuleEvent>>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage>>,
    message_sender: mpsc::Sender<ModuleMessage>,
    last_status: Arc<Mutex<StatusMap>>,
    running: bool,
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_sender, message_receiver) = mpsc::channel(1000);

        Self {
            modules: HashMap::new(),
            module_handles: HashMap::new(),
            module_senders: HashMap::new(),
            message_receiver: Some(message_receiver),
            message_sender,
            last_status: Arc::new(Mutex::new(HashMap::new())),
            running: false,
        }
    }

    /// Register a new module with the manager
    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        let id = module.id();
        log::debug!("Registering module {:?}", id);
        self.modules.insert(id, module);
    }

    /// Initialize all registered modules
    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for (id, module) in &mut self.modules {
            match module.initialize().await {
                Ok(_) => log::info!("Module {:?} initialized successfully", id),
                Err(e) => {
                    log::error!("Failed to initialize module {:?}: {}", id, e);
                    return Err(format!("{:?} module error: {}", id, e).into());
                }
            }
        }
        Ok(())
    }

    /// Start every module in its own task. When a module's loop returns,
    /// the task runs its `shutdown` and records its final status.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running {
            return Err("Module manager is already running".into());
        }

        for (id, mut module) in std::mem::take(&mut self.modules) {
            let (event_tx, event_rx) = mpsc::channel(1000);
            let message_tx = self.message_sender.clone();
            let last_status = self.last_status.clone();
            let module_id = id.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                    let _ = message_tx
                        .send(ModuleMessage::Error(format!(
                            "Module {:?} error: {}",
                            module_id, e
                        )))
                        .await;
                }

                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", module_id, e);
                }

                last_status.lock().insert(module_id, module.status());
            });

            self.module_handles.insert(id.clone(), handle);
            self.module_senders.insert(id, event_tx);
        }

        self.running = true;
        Ok(())
    }

    /// Send an event to a specific module
    pub async fn send_to_module(
        &self,
        module_id: ModuleId,
        event: ModuleEvent,
    ) -> Result<(), String> {
        match self.module_senders.get(&module_id) {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| format!("Failed to send event to module {:?}: {}", module_id, e)),
            None => Err(format!("Module {:?} not found", module_id)),
        }
    }

    /// Forward the host's activation toggle to one module.
    pub async fn set_active(&self, module_id: ModuleId, yn: bool) -> Result<(), String> {
        self.send_to_module(module_id, ModuleEvent::SetActive(yn))
            .await
    }

    /// Broadcast an event to all modules
    pub async fn broadcast_event(&self, event: ModuleEvent) {
        for (id, sender) in &self.module_senders {
            if let Err(e) = sender.send(event.clone()).await {
                log::warn!("Failed to broadcast event to module {:?}: {}", id, e);
            }
        }
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_receiver.take()
    }

    /// Shutdown all modules gracefully
    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.running {
            return Ok(());
        }

        log::info!("Shutting down module manager...");

        self.broadcast_event(ModuleEvent::Shutdown).await;

        for (id, handle) in std::mem::take(&mut self.module_handles) {
            log::info!("Waiting for module {:?} to shutdown...", id);
            if let Err(e) = handle.await {
                log::error!("Module {:?} shutdown error: {}", id, e);
            }
        }

        self.module_senders.clear();

        self.running = false;
        log::info!("Module manager shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Status of modules that have not been started, plus the final status
    /// of modules that have stopped.
    pub fn get_status(&self) -> StatusMap {
        let mut status = self.last_status.lock().clone();
        for (id, module) in &self.modules {
            status.insert(id.clone(), module.status());
        }
        status
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct EchoModule {
        seen: usize,
        shut_down: bool,
    }

    #[async_trait]
    impl AsyncModule for EchoModule {
        fn id(&self) -> ModuleId {
            ModuleId::Push2
        }

        async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent>,
            tx: mpsc::Sender<ModuleMessage>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            while let Some(event) = rx.recv().await {
                match event {
                    ModuleEvent::Shutdown => break,
                    other => {
                        self.seen += 1;
                        let _ = tx.send(ModuleMessage::Event(other)).await;
                    }
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.shut_down = true;
            Ok(())
        }

        fn status(&self) -> HashMap<String, String> {
            HashMap::from([
                ("seen".to_string(), self.seen.to_string()),
                ("shut_down".to_string(), self.shut_down.to_string()),
            ])
        }
    }

    #[tokio::test]
    async fn test_lifecycle_runs_shutdown_and_keeps_status() {
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(EchoModule {
            seen: 0,
            shut_down: false,
        }));
        let mut messages = manager.take_message_receiver().unwrap();

        manager.initialize().await.unwrap();
        manager.start().await.unwrap();
        assert!(manager.start().await.is_err());

        manager.set_active(ModuleId::Push2, true).await.unwrap();
        assert!(matches!(
            messages.recv().await,
            Some(ModuleMessage::Event(ModuleEvent::SetActive(true)))
        ));

        manager.shutdown().await.unwrap();
        assert!(!manager.is_running());

        let status = manager.get_status();
        let push2 = &status[&ModuleId::Push2];
        assert_eq!(push2["seen"], "1");
        assert_eq!(push2["shut_down"], "true");
    }
}
