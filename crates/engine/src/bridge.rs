use std::sync::mpsc;
use std::thread;

use tracing::debug;

use crate::api::{Command, Engine, EngineErrorEvent, Event};
use crate::export::ExportBackend;
use crate::gesture::PointerSurface;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Sender used by the host thread to dispatch commands to the engine thread.
pub type EngineCommandSender = mpsc::SyncSender<Command>;

/// Receiver used by the host thread to read events emitted by the engine thread.
pub type EngineEventReceiver = mpsc::Receiver<Event>;

/// Moves the engine onto its own thread and returns its channel endpoints.
///
/// Commands are applied strictly in arrival order. Failed commands surface as
/// [`Event::Error`]. The thread exits once the command sender is dropped or the
/// event receiver goes away.
pub fn spawn_engine_bridge<S, X>(
    mut engine: Engine<S, X>,
) -> (EngineCommandSender, EngineEventReceiver)
where
    S: PointerSurface + Send + 'static,
    X: ExportBackend + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            match engine.handle_command(command) {
                Ok(events) => {
                    for event in events {
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    if event_tx
                        .send(Event::Error(EngineErrorEvent::from_error(&error)))
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
        debug!("engine bridge stopped: command sender dropped");
    });

    (command_tx, event_rx)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{Command, Engine, Event, spawn_engine_bridge};
    use crate::api::EngineErrorKind;
    use crate::export::{ExportBackend, ExportRequest};
    use crate::gesture::DetachedSurface;

    #[test]
    fn bridge_forwards_engine_events_for_load_command() {
        let (command_tx, event_rx) = spawn_engine_bridge(Engine::new(DetachedSurface, NoExport));

        command_tx
            .send(Command::LoadSource {
                total_duration: 60.0,
                source: None,
            })
            .expect("send load command");

        let first = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first event");
        let second = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("second event");

        assert!(matches!(first, Event::ClipsChanged(_)));
        assert_eq!(second, Event::PlayheadChanged { time: 0.0 });
    }

    #[test]
    fn bridge_emits_error_event_when_command_fails() {
        let (command_tx, event_rx) = spawn_engine_bridge(Engine::new(DetachedSurface, NoExport));

        command_tx
            .send(Command::SetPlayhead { time: 10.0 })
            .expect("send set playhead command");

        let event = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("error event");

        let Event::Error(error) = event else {
            panic!("expected Event::Error");
        };
        assert_eq!(error.kind, EngineErrorKind::NoSourceLoaded);
        assert!(error.message.contains("no source is loaded"));
    }

    #[test]
    fn bridge_stops_after_command_sender_is_dropped() {
        let (command_tx, event_rx) = spawn_engine_bridge(Engine::new(DetachedSurface, NoExport));

        drop(command_tx);

        assert!(event_rx.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[derive(Debug, Clone, Copy)]
    struct NoExport;

    impl ExportBackend for NoExport {
        fn export(
            &self,
            _request: &ExportRequest,
            _on_progress: &mut dyn FnMut(u8),
        ) -> crate::Result<PathBuf> {
            Ok(PathBuf::from("out.mp4"))
        }
    }
}
