//! WebSocket IPC bridge between Bevy and a host application.
//!
//! The server runs on its own thread with a current-thread tokio runtime and
//! talks to Bevy only through unbounded channels of JSON strings. It never
//! touches the scene; inbound messages become plugin messages here.

use std::time::{Duration, Instant};

use bevy::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::ipc::{HostToViewer, ViewerToHost};
use parallax_bevy::events::{
    CameraCommandMessage, CaptureCameraPosition, ClearScene, OptionsEchoed, SetOptions,
    SetTelemetry,
};
use parallax_bevy::resources::{CameraReadout, SceneState};
use parallax_core::camera::CameraCommand;
use parallax_core::shape::CameraSettings;

/// Minimum gap between two camera readouts sent to the host.
const READOUT_INTERVAL: Duration = Duration::from_millis(100);

/// Resource holding outbound messages to send to the host.
///
/// Systems queue messages via `send()`, and the `flush_outbound_messages`
/// system drains them each frame and forwards over WebSocket.
#[derive(Resource, Default)]
pub struct OutboundHostMessages {
    messages: Vec<ViewerToHost>,
}

impl OutboundHostMessages {
    /// Queue a message to send to the host.
    pub fn send(&mut self, msg: ViewerToHost) {
        self.messages.push(msg);
    }

    /// Drain all queued messages, returning them.
    pub fn drain(&mut self) -> Vec<ViewerToHost> {
        std::mem::take(&mut self.messages)
    }
}

/// Resource holding the channel endpoints for WebSocket IPC.
#[derive(Resource)]
pub struct WsBridge {
    /// Send messages from Bevy to the WebSocket server (-> host).
    pub outbound_tx: mpsc::UnboundedSender<String>,
    /// Receive messages from the WebSocket server (<- host).
    pub inbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Spawn the WebSocket server on a dedicated thread.
///
/// Returns channel endpoints for Bevy systems to communicate with.
/// The server listens on `ws://127.0.0.1:{port}` and handles one
/// client connection at a time.
pub fn spawn_ws_server(
    port: u16,
) -> (
    mpsc::UnboundedSender<String>,
    mpsc::UnboundedReceiver<String>,
) {
    let (bevy_to_ws_tx, mut bevy_to_ws_rx) = mpsc::unbounded_channel::<String>();
    let (ws_to_bevy_tx, ws_to_bevy_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime for WS bridge");

        rt.block_on(async move {
            let addr = format!("127.0.0.1:{port}");
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!("Failed to bind WebSocket server on {addr}: {e}");
                    return;
                }
            };

            tracing::info!("WebSocket IPC server listening on ws://{addr}");

            // One client at a time; the next is accepted after a disconnect.
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    continue;
                };
                tracing::info!("WebSocket client connected: {peer}");

                let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        tracing::error!("WebSocket handshake failed: {e}");
                        continue;
                    }
                };

                let (mut ws_sink, mut ws_source) = ws_stream.split();
                let tx = ws_to_bevy_tx.clone();

                let recv_handle = tokio::spawn(async move {
                    while let Some(Ok(msg)) = ws_source.next().await {
                        if let tokio_tungstenite::tungstenite::Message::Text(text) = msg
                            && tx.send(text.to_string()).is_err()
                        {
                            break;
                        }
                    }
                });

                // Pin the JoinHandle so select! can poll it by &mut ref.
                tokio::pin!(recv_handle);
                loop {
                    tokio::select! {
                        result = &mut recv_handle => {
                            let _ = result;
                            break;
                        }
                        msg = bevy_to_ws_rx.recv() => {
                            match msg {
                                Some(text) => {
                                    let ws_msg = tokio_tungstenite::tungstenite::Message::Text(text.into());
                                    if ws_sink.send(ws_msg).await.is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }

                tracing::info!("WebSocket client disconnected");
            }
        });
    });

    (bevy_to_ws_tx, ws_to_bevy_rx)
}

/// Bevy system: sends queued outbound messages over the WebSocket bridge.
pub fn flush_outbound_messages(mut outbound: ResMut<OutboundHostMessages>, bridge: Res<WsBridge>) {
    for msg in outbound.drain() {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                let _ = bridge.outbound_tx.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize ViewerToHost: {e}"),
        }
    }
}

/// Writers for every plugin message a host can trigger.
#[derive(bevy::ecs::system::SystemParam)]
pub struct HostMessageWriters<'w> {
    options: MessageWriter<'w, SetOptions>,
    telemetry: MessageWriter<'w, SetTelemetry>,
    clear: MessageWriter<'w, ClearScene>,
    camera: MessageWriter<'w, CameraCommandMessage>,
    capture: MessageWriter<'w, CaptureCameraPosition>,
}

/// Bevy system: receives inbound messages from the WebSocket bridge
/// and dispatches them as plugin messages.
pub fn poll_inbound_messages(
    mut bridge: ResMut<WsBridge>,
    state: Res<SceneState>,
    mut writers: HostMessageWriters,
    mut outbound: ResMut<OutboundHostMessages>,
) {
    while let Ok(json) = bridge.inbound_rx.try_recv() {
        match serde_json::from_str::<HostToViewer>(&json) {
            Ok(msg) => dispatch_host_message(msg, &state, &mut writers, &mut outbound),
            Err(e) => {
                tracing::warn!("Failed to parse host message: {e}");
                outbound.send(ViewerToHost::Error {
                    message: format!("Unrecognized message: {e}"),
                });
            }
        }
    }
}

fn dispatch_host_message(
    msg: HostToViewer,
    state: &SceneState,
    writers: &mut HostMessageWriters,
    outbound: &mut OutboundHostMessages,
) {
    match msg {
        HostToViewer::RequestState => {
            outbound.send(ViewerToHost::Initialize {
                options: state.options.clone(),
            });
        }
        HostToViewer::SetOptions { options } => {
            tracing::debug!("Host sent options with {} shapes", options.shapes.len());
            writers.options.write(SetOptions { options });
        }
        HostToViewer::SetTelemetry { telemetry } => {
            writers.telemetry.write(SetTelemetry { telemetry });
        }
        HostToViewer::ClearScene => {
            writers.clear.write(ClearScene);
        }
        HostToViewer::MoveTo {
            position,
            target,
            tag,
        } => {
            writers.camera.write(CameraCommandMessage {
                command: CameraCommand::MoveTo {
                    position,
                    target,
                    tag,
                },
            });
        }
        HostToViewer::MoveToPreset { tag } => match preset_command(&state.options.camera, &tag) {
            Ok(command) => {
                writers.camera.write(CameraCommandMessage { command });
            }
            Err(reply) => {
                tracing::warn!("Host asked for unknown camera preset `{tag}`");
                outbound.send(reply);
            }
        },
        HostToViewer::CapturePosition => {
            writers.capture.write(CaptureCameraPosition);
        }
    }
}

/// Resolve a preset tag against the configured camera, or the error to send back.
fn preset_command(camera: &CameraSettings, tag: &str) -> Result<CameraCommand, ViewerToHost> {
    camera
        .preset(tag)
        .map(CameraCommand::move_to_preset)
        .ok_or_else(|| ViewerToHost::Error {
            message: format!("Unknown camera preset: {tag}"),
        })
}

/// Bevy system: forward options the plugin changed back to the host.
pub fn forward_echoed_options(
    mut echoed: MessageReader<OptionsEchoed>,
    mut outbound: ResMut<OutboundHostMessages>,
) {
    for msg in echoed.read() {
        outbound.send(ViewerToHost::OptionsEchoed {
            options: msg.options.clone(),
        });
    }
}

/// Bevy system: publish the camera readout when it changes, rate-limited.
pub fn publish_camera_readout(
    readout: Res<CameraReadout>,
    mut last: Local<Option<(Instant, CameraReadout)>>,
    mut outbound: ResMut<OutboundHostMessages>,
) {
    let now = Instant::now();
    if let Some((sent_at, previous)) = *last
        && (now.duration_since(sent_at) < READOUT_INTERVAL || same_readout(&previous, &readout))
    {
        return;
    }
    outbound.send(ViewerToHost::CameraReadout {
        position: readout.position.to_array(),
        target: readout.target.to_array(),
        distance: readout.distance,
        entity_count: readout.entity_count,
    });
    *last = Some((now, *readout));
}

fn same_readout(a: &CameraReadout, b: &CameraReadout) -> bool {
    a.entity_count == b.entity_count
        && a.position.abs_diff_eq(b.position, 1e-4)
        && a.target.abs_diff_eq(b.target, 1e-4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::shape::CameraPreset;

    #[test]
    fn test_outbound_queue_drains_in_order() {
        let mut outbound = OutboundHostMessages::default();
        outbound.send(ViewerToHost::Error {
            message: "a".into(),
        });
        outbound.send(ViewerToHost::Error {
            message: "b".into(),
        });
        let drained = outbound.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(&drained[0], ViewerToHost::Error { message } if message == "a"));
        assert!(outbound.drain().is_empty());
    }

    #[test]
    fn test_preset_command_resolves_tag() {
        let camera = CameraSettings {
            presets: vec![CameraPreset {
                tag: "dock".into(),
                position: [1.0, 2.0, 3.0],
                target: [0.0; 3],
            }],
            ..Default::default()
        };
        assert!(matches!(
            preset_command(&camera, "dock"),
            Ok(CameraCommand::MoveTo { position, tag: Some(tag), .. })
                if position == [1.0, 2.0, 3.0] && tag == "dock"
        ));
        assert!(matches!(
            preset_command(&camera, "nope"),
            Err(ViewerToHost::Error { message }) if message.contains("nope")
        ));
    }

    #[test]
    fn test_same_readout_ignores_jitter() {
        let a = CameraReadout {
            position: Vec3::new(1.0, 2.0, 3.0),
            target: Vec3::ZERO,
            distance: 3.74,
            entity_count: 2,
        };
        let mut b = a;
        b.position.x += 1e-6;
        assert!(same_readout(&a, &b));
        b.entity_count = 3;
        assert!(!same_readout(&a, &b));
    }
}
