use tokio::signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ShutdownSignal {
    SigInt,
    SigTerm,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(std::io::Error),
    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    Sigterm(std::io::Error),
}

/// Resolves on the first Ctrl+C or SIGTERM.
pub async fn wait_for_signal() -> Result<ShutdownSignal, ShutdownSignalError> {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .map(|()| ShutdownSignal::SigInt)
            .map_err(ShutdownSignalError::CtrlC)
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::Sigterm)?;
        let _ = sigterm.recv().await;
        Ok(ShutdownSignal::SigTerm)
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<ShutdownSignal, ShutdownSignalError>>();

    tokio::select! {
        result = interrupt => result,
        result = terminate => result,
    }
}
