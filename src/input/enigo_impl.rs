//! Keyboard and mouse synthesis through `enigo`.
//!
//! `Enigo` is not guaranteed to be `Send` on every platform, so it lives on a
//! dedicated worker thread. Callers hand commands over a channel and block
//! until the worker reports the outcome.

use super::error::{InputError, InputResult};
use super::types::{InputCommand, InputSynthesizer, Key};
use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

type Request = (InputCommand, mpsc::Sender<InputResult<()>>);

/// Input synthesizer backed by a single `Enigo` instance.
pub struct EnigoInput {
    tx: mpsc::Sender<Request>,
}

impl EnigoInput {
    /// Start the worker thread. `typing_interval` is the pause between typed characters.
    pub fn new(typing_interval: Duration) -> InputResult<Self> {
        let (tx, rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<InputResult<()>>();

        thread::Builder::new()
            .name("enigo-input".to_string())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(InputError::BackendInit {
                            description: format!("{e:?}"),
                        }));
                        return;
                    }
                };
                // Exits once every `EnigoInput` handle is dropped.
                while let Ok((command, reply)) = rx.recv() {
                    let result = execute(&mut enigo, &command, typing_interval);
                    let _ = reply.send(result);
                }
                log::debug!("⌨️ Input worker stopped");
            })
            .map_err(|e| InputError::BackendInit {
                description: e.to_string(),
            })?;

        ready_rx.recv().map_err(|_| InputError::WorkerStopped)??;
        log::info!("⌨️ Input controller ready");
        Ok(Self { tx })
    }
}

impl InputSynthesizer for EnigoInput {
    fn send(&self, command: InputCommand) -> InputResult<()> {
        log::debug!("⌨️ Sending {}", command);
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send((command, reply_tx))
            .map_err(|_| InputError::WorkerStopped)?;
        reply_rx.recv().map_err(|_| InputError::WorkerStopped)?
    }
}

fn to_enigo(key: Key) -> enigo::Key {
    match key {
        Key::Char(c) => enigo::Key::Unicode(c),
        Key::Return => enigo::Key::Return,
        Key::Escape => enigo::Key::Escape,
    }
}

fn execute(
    enigo: &mut Enigo,
    command: &InputCommand,
    typing_interval: Duration,
) -> InputResult<()> {
    let fail = |e: enigo::InputError| InputError::Synthesis {
        command: command.to_string(),
        description: format!("{e:?}"),
    };

    match command {
        InputCommand::Press(key) => {
            enigo.key(to_enigo(*key), Direction::Click).map_err(fail)?;
            thread::sleep(Duration::from_millis(50));
        }
        InputCommand::TypeText(text) => {
            let mut buf = [0u8; 4];
            for c in text.chars() {
                enigo.text(c.encode_utf8(&mut buf)).map_err(fail)?;
                thread::sleep(typing_interval);
            }
        }
        InputCommand::Click { x, y } => {
            enigo.move_mouse(*x, *y, Coordinate::Abs).map_err(fail)?;
            thread::sleep(Duration::from_millis(50)); // Let cursor settle
            enigo.button(Button::Left, Direction::Click).map_err(fail)?;
            thread::sleep(Duration::from_millis(100));
        }
        InputCommand::DoubleClick { x, y } => {
            enigo.move_mouse(*x, *y, Coordinate::Abs).map_err(fail)?;
            thread::sleep(Duration::from_millis(50));
            enigo.button(Button::Left, Direction::Click).map_err(fail)?;
            thread::sleep(Duration::from_millis(80));
            enigo.button(Button::Left, Direction::Click).map_err(fail)?;
            thread::sleep(Duration::from_millis(100));
        }
        InputCommand::MovePointer { x, y } => {
            enigo.move_mouse(*x, *y, Coordinate::Abs).map_err(fail)?;
        }
        InputCommand::ForceQuit => {
            // Classic Mac OS force-quit chord, then confirm the dialog.
            enigo.key(enigo::Key::Meta, Direction::Press).map_err(fail)?;
            enigo.key(enigo::Key::Alt, Direction::Press).map_err(fail)?;
            let chord = enigo.key(enigo::Key::Escape, Direction::Click);
            let _ = enigo.key(enigo::Key::Alt, Direction::Release);
            let _ = enigo.key(enigo::Key::Meta, Direction::Release);
            chord.map_err(fail)?;
            thread::sleep(Duration::from_millis(500));
            enigo.key(enigo::Key::Return, Direction::Click).map_err(fail)?;
        }
    }
    Ok(())
}
