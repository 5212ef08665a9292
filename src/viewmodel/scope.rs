use tokio::sync::watch;

/// Held by whatever hosts a view. Unmounting, or dropping the handle, tells
/// the view to discard results of requests still in flight.
pub struct MountHandle {
    tx: watch::Sender<bool>,
}

impl MountHandle {
    pub fn unmount(&self) {
        self.tx.send_replace(false);
    }
}

#[derive(Clone)]
pub struct ViewScope {
    rx: watch::Receiver<bool>,
}

impl ViewScope {
    pub fn is_mounted(&self) -> bool {
        self.rx.has_changed().is_ok() && *self.rx.borrow()
    }

    /// Resolves once the view has been unmounted.
    pub async fn unmounted(&mut self) {
        let _ = self.rx.wait_for(|mounted| !mounted).await;
    }
}

pub fn mount() -> (MountHandle, ViewScope) {
    let (tx, rx) = watch::channel(true);
    (MountHandle { tx }, ViewScope { rx })
}
