use crate::api::Mode;
use crate::commands::show::render_view;
use crate::commands::{open_session, Credentials, Out};
use crate::session::Session;
use crate::{Config, Result};
use std::future::Future;
use tracing::{debug, info};

/// Stays signed in and prints the dashboard whenever it changes, until Ctrl-C.
pub async fn watch(config: Config, mode: Mode, credentials: &Credentials) -> Result<Out<()>> {
    let mut session = open_session(&config, mode, credentials).await?;
    info!("Watching '{}', press Ctrl-C to stop", config.document_key());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for Ctrl-C: {e}");
        }
    };
    let updates = watch_until(&mut session, config.currency_symbol(), shutdown).await?;
    session.sign_out().await?;
    Ok(format!("Stopped watching after {updates} update(s)").into())
}

/// Prints the dashboard now and after every change until `shutdown` completes or the session
/// ends. Returns the number of times the dashboard was printed.
pub async fn watch_until(
    session: &mut Session,
    currency_symbol: &str,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let mut shutdown = std::pin::pin!(shutdown);
    let mut last = session.view();
    info!("{}", render_view(&last, currency_symbol));
    let mut printed = 1;

    loop {
        let more = tokio::select! {
            _ = &mut shutdown => {
                debug!("Shutting down");
                break;
            }
            more = session.next_event() => more,
        };
        // Subscription errors are shown in the dashboard, other errors end the watch.
        if !more? {
            break;
        }
        let view = session.view();
        if view != last {
            info!("{}", render_view(&view, currency_symbol));
            printed += 1;
            last = view;
        }
    }
    Ok(printed)
}
