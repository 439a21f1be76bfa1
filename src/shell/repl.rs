use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::presenter::Presenter;
use crate::control::{self, ControlState, Reply, ShellCommand};
use crate::session::SessionEvent;

/// Run the shell until `quit`, an accepted Ctrl+C, or end of input
pub async fn run<R, P>(state: &mut ControlState, input: R, presenter: &mut P) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    P: Presenter,
{
    let mut lines = input.lines();
    let mut events = state.subscribe();
    let mut listen_ctrl_c = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    match control::finish_input(state).await {
                        Ok(Some(summary)) => presenter.render_reply(&Reply::Stopped { summary })?,
                        Ok(None) => {}
                        Err(e) => presenter.render_error(&e)?,
                    }
                    break;
                };

                let command = match ShellCommand::parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        presenter.notice(&e.to_string())?;
                        continue;
                    }
                };

                debug!("Shell command: {:?}", command);
                match control::handle(state, command).await {
                    Ok(Reply::Quit) => {
                        drain(&mut events, presenter)?;
                        presenter.render_reply(&Reply::Quit)?;
                        return Ok(());
                    }
                    Ok(reply) => {
                        drain(&mut events, presenter)?;
                        presenter.render_reply(&reply)?;
                    }
                    Err(e) => presenter.render_error(&e)?,
                }
            }

            event = events.recv() => match event {
                Ok(event) => presenter.render_event(&event)?,
                Err(RecvError::Lagged(skipped)) => debug!("Shell skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },

            signal = tokio::signal::ctrl_c(), if listen_ctrl_c => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    listen_ctrl_c = false;
                    continue;
                }
                info!("Ctrl+C received");
                match control::request_shutdown(state).await {
                    Ok(()) => {
                        presenter.render_reply(&Reply::Quit)?;
                        return Ok(());
                    }
                    Err(e) => presenter.render_error(&e)?,
                }
            }
        }
    }

    drain(&mut events, presenter)?;
    Ok(())
}

/// Render events already published, so replies follow the state they caused
fn drain<P: Presenter>(events: &mut broadcast::Receiver<SessionEvent>, presenter: &mut P) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => presenter.render_event(&event)?,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return Ok(()),
        }
    }
}
