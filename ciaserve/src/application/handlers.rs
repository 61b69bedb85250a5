use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ciaserve_core::config::DEFAULT_EXTENSIONS;
use ciaserve_core::error::{Result, ShareError};
use ciaserve_core::{
    CatalogWatcher, ProgressObserver, ProgressRegistry, QrSvgGenerator, ShareConfig,
    ShareableGenerator,
};
use ciaserve_http::AppState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::address::{self, HostSource, OVERRIDE_FILE};
use crate::presentation::cli::{ServeArgs, ShareArgs};
use crate::presentation::progress::TerminalProgress;
use crate::presentation::terminal::TerminalEcho;

/// How long in-flight downloads get to finish after Ctrl-C.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

fn config_from_args(share: &ShareArgs) -> Result<ShareConfig> {
    let host = address::resolve(share.host, &share.dir)?;
    match host.source {
        HostSource::Flag => info!(host = %host.advertise, "using address from --host"),
        HostSource::OverrideFile => {
            info!(host = %host.advertise, "manually set IP address");
            info!("if this looks wrong, edit or delete '{OVERRIDE_FILE}' to detect the IP automatically");
        }
        HostSource::Detected => info!(host = %host.advertise, "detected LAN address"),
        HostSource::Loopback => {
            warn!("could not detect a LAN address; QR codes will point at localhost")
        }
    }

    let extensions = if share.extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        share.extensions.clone()
    };
    Ok(ShareConfig {
        root: share.dir.clone(),
        extensions,
        port: share.port,
        bind: host.bind,
        advertise_host: host.advertise.to_string(),
        ..Default::default()
    })
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut cfg = config_from_args(&args.share)?;
    cfg.poll_interval_ms = args.poll_ms;
    cfg.chunk_size = args.chunk_size;
    cfg.validate()?;

    let registry = Arc::new(ProgressRegistry::new());
    let generator: Arc<dyn ShareableGenerator> = if args.print_qr {
        Arc::new(TerminalEcho::new(QrSvgGenerator::default()))
    } else {
        Arc::new(QrSvgGenerator::default())
    };
    let watcher = CatalogWatcher::new(&cfg, registry.clone(), generator);

    info!(addr = %cfg.bind_addr(), "starting web server");
    let listener = ciaserve_http::bind(cfg.bind_addr()).await?;

    watcher.reconcile().await;
    if registry.is_empty() {
        warn!(
            dir = %cfg.root.display(),
            extensions = ?cfg.extensions,
            "no files to share yet; new files will show up as they are added"
        );
    } else {
        info!(count = registry.len(), "found file(s) to share");
    }
    info!(url = %cfg.base_url(), "open this page and scan a code with your homebrew manager (e.g. FBI)");
    info!("keep this running while transfers are in progress; several consoles can download at once");

    let observer: Arc<dyn ProgressObserver> = if args.no_progress {
        registry.clone()
    } else {
        Arc::new(TerminalProgress::new(registry.clone()))
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let watcher_task = tokio::spawn(watcher.run(stop_rx.clone()));

    let state = AppState::new(&cfg, registry)
        .with_observer(observer)
        .with_shutdown(stop_rx.clone());
    let mut server_stop = stop_rx;
    let mut server = tokio::spawn(ciaserve_http::serve(listener, state, async move {
        let _ = server_stop.wait_for(|stop| *stop).await;
    }));

    let served = tokio::select! {
        res = &mut server => joined(res),
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down; press Ctrl-C again to quit without waiting for downloads");
            let _ = stop_tx.send(true);
            drain(&mut server, tokio::signal::ctrl_c(), DRAIN_GRACE).await
        }
    };

    let _ = stop_tx.send(true);
    let _ = watcher_task.await;
    served
}

/// Wait for the server to wind down, unless `interrupt` fires or `grace`
/// runs out first; either of those aborts it.
async fn drain<F, T>(server: &mut JoinHandle<Result<()>>, interrupt: F, grace: Duration) -> Result<()>
where
    F: Future<Output = T>,
{
    tokio::select! {
        res = &mut *server => return joined(res),
        _ = interrupt => warn!("second interrupt, exiting now"),
        _ = tokio::time::sleep(grace) => warn!(?grace, "downloads still running, exiting anyway"),
    }
    server.abort();
    Ok(())
}

fn joined(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.map_err(|e| ShareError::Io(std::io::Error::other(e)))?
}

pub async fn handle_list(args: ShareArgs) -> Result<()> {
    let cfg = config_from_args(&args)?;
    cfg.validate()?;
    let registry = Arc::new(ProgressRegistry::new());
    let watcher = CatalogWatcher::new(&cfg, registry.clone(), Arc::new(QrSvgGenerator::default()));
    watcher.reconcile().await;
    for entry in registry.snapshot() {
        println!("{}  {}", entry.id, entry.download_url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn explicit_host_and_extensions_flow_into_config() {
        let args = ShareArgs {
            dir: PathBuf::from("/srv/share"),
            host: Some("10.0.0.8".parse().unwrap()),
            port: 9999,
            extensions: vec!["nds".into()],
        };
        let cfg = config_from_args(&args).unwrap();
        assert_eq!(cfg.base_url(), "http://10.0.0.8:9999");
        assert_eq!(cfg.bind_addr().to_string(), "10.0.0.8:9999");
        assert_eq!(cfg.extensions, vec!["nds"]);
        assert_eq!(cfg.root, PathBuf::from("/srv/share"));
    }

    #[test]
    fn default_extensions_when_none_given() {
        let dir = tempfile::tempdir().unwrap();
        let args = ShareArgs {
            dir: dir.path().to_path_buf(),
            host: Some("127.0.0.1".parse().unwrap()),
            ..Default::default()
        };
        let cfg = config_from_args(&args).unwrap();
        assert_eq!(cfg.extensions, vec!["cia", "3dsx"]);
        assert_eq!(cfg.port, 8888);
    }

    #[tokio::test]
    async fn drain_returns_the_server_result() {
        let mut server = tokio::spawn(async { Ok(()) });
        let res = drain(&mut server, std::future::pending::<()>(), Duration::from_secs(5)).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn second_interrupt_abandons_a_stuck_drain() {
        let mut server: JoinHandle<Result<()>> = tokio::spawn(std::future::pending());
        let res = tokio::time::timeout(
            Duration::from_secs(2),
            drain(&mut server, async {}, Duration::from_secs(60)),
        )
        .await
        .expect("drain ignored the interrupt");
        assert!(res.is_ok());
        let err = (&mut server).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn drain_gives_up_after_the_grace_period() {
        let mut server: JoinHandle<Result<()>> = tokio::spawn(std::future::pending());
        let res = drain(
            &mut server,
            std::future::pending::<()>(),
            Duration::from_millis(20),
        )
        .await;
        assert!(res.is_ok());
        assert!((&mut server).await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn bind_failure_is_reported_not_served() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();

        let args = ServeArgs {
            share: ShareArgs {
                dir: dir.path().to_path_buf(),
                host: Some("127.0.0.1".parse().unwrap()),
                port,
                extensions: Vec::new(),
            },
            ..Default::default()
        };
        let err = handle_serve(args).await.unwrap_err();
        assert!(matches!(err, ciaserve_core::ShareError::Bind { .. }), "{err}");
    }
}
