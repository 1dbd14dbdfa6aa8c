//! Simulated pointer and keyboard input.
//!
//! Every sub-action is followed by a blocking sleep so the game sees human-paced
//! input. Nothing here is cancellable and no call has a timeout.

use crate::board::Point;
use crate::error::PlayError;

use anyhow::{Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::{thread::sleep, time::Duration};

const DRAG_NUDGE: Point = (16, 32);
const DRAG_STEPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    Left,
    Right,
}

/// Input-delivery primitives. Delivery is fire-and-forget: an `Ok` only means
/// the OS accepted the event.
pub trait Actuator {
    fn press(&mut self, code: u32) -> Result<(), PlayError>;
    fn release(&mut self, code: u32) -> Result<(), PlayError>;
    fn click(&mut self, point: Point, mode: ClickMode, hold: Duration) -> Result<(), PlayError>;
    fn drag(&mut self, from: Point, to: Point) -> Result<(), PlayError>;
}

/// Presses and releases a key.
pub fn tap(actuator: &mut impl Actuator, code: u32, hold: Duration) -> Result<(), PlayError> {
    actuator.press(code)?;
    sleep(hold);
    actuator.release(code)
}

pub struct EnigoActuator<E = Enigo> {
    enigo: E,
    leg: Duration,
}

impl EnigoActuator {
    /// `leg` is the pause between the sub-steps of a drag.
    pub fn new(leg: Duration) -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).context("Failed to init enigo")?;
        Ok(Self::with_backend(enigo, leg))
    }
}

impl<E> EnigoActuator<E> {
    pub fn with_backend(enigo: E, leg: Duration) -> Self {
        Self { enigo, leg }
    }
}

impl<E: Mouse + Keyboard> Actuator for EnigoActuator<E> {
    fn press(&mut self, code: u32) -> Result<(), PlayError> {
        self.enigo.key(Key::Other(code), Direction::Press)?;
        Ok(())
    }

    fn release(&mut self, code: u32) -> Result<(), PlayError> {
        self.enigo.key(Key::Other(code), Direction::Release)?;
        Ok(())
    }

    fn click(&mut self, point: Point, mode: ClickMode, hold: Duration) -> Result<(), PlayError> {
        self.enigo.move_mouse(point.0, point.1, Coordinate::Abs)?;
        let button = match mode {
            ClickMode::Left => Button::Left,
            ClickMode::Right => Button::Right,
        };
        self.enigo.button(button, Direction::Press)?;
        sleep(hold);
        self.enigo.button(button, Direction::Release)?;
        Ok(())
    }

    fn drag(&mut self, from: Point, to: Point) -> Result<(), PlayError> {
        let (from_x, from_y) = from;
        let (to_x, to_y) = to;

        self.enigo.move_mouse(from_x, from_y, Coordinate::Abs)?;
        self.enigo.button(Button::Left, Direction::Press)?;
        sleep(self.leg);

        // A small nudge makes the game pick the card up before the long leg.
        self.enigo
            .move_mouse(DRAG_NUDGE.0, DRAG_NUDGE.1, Coordinate::Rel)?;
        sleep(self.leg);

        let (start_x, start_y) = (from_x + DRAG_NUDGE.0, from_y + DRAG_NUDGE.1);
        let dx = (to_x - start_x) as f32 / DRAG_STEPS as f32;
        let dy = (to_y - start_y) as f32 / DRAG_STEPS as f32;
        for i in 1..=DRAG_STEPS {
            let x = start_x as f32 + dx * i as f32;
            let y = start_y as f32 + dy * i as f32;
            self.enigo
                .move_mouse(x as i32, y as i32, Coordinate::Abs)?;
            sleep(self.leg / DRAG_STEPS);
        }
        sleep(self.leg);

        self.enigo.button(Button::Left, Direction::Release)?;
        sleep(self.leg);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Input {
        Press(u32),
        Release(u32),
        Click(Point, ClickMode),
        Drag(Point, Point),
    }

    /// Records inputs instead of delivering them; optionally fails on one call.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub inputs: Vec<Input>,
        pub fail_at: Option<usize>,
    }

    impl Recorder {
        fn push(&mut self, input: Input) -> Result<(), PlayError> {
            if self.fail_at == Some(self.inputs.len()) {
                return Err(PlayError::Actuation(enigo::InputError::Simulate(
                    "event rejected",
                )));
            }
            self.inputs.push(input);
            Ok(())
        }
    }

    impl Actuator for Recorder {
        fn press(&mut self, code: u32) -> Result<(), PlayError> {
            self.push(Input::Press(code))
        }

        fn release(&mut self, code: u32) -> Result<(), PlayError> {
            self.push(Input::Release(code))
        }

        fn click(&mut self, point: Point, mode: ClickMode, _: Duration) -> Result<(), PlayError> {
            self.push(Input::Click(point, mode))
        }

        fn drag(&mut self, from: Point, to: Point) -> Result<(), PlayError> {
            self.push(Input::Drag(from, to))
        }
    }

    #[test]
    fn test_tap_presses_then_releases() {
        let mut recorder = Recorder::default();
        tap(&mut recorder, 0x71, Duration::ZERO).unwrap();
        assert_eq!(recorder.inputs, [Input::Press(0x71), Input::Release(0x71)]);
    }

    #[test]
    fn test_failed_delivery_is_fatal() {
        let mut recorder = Recorder {
            fail_at: Some(1),
            ..Default::default()
        };
        let err = tap(&mut recorder, 0x71, Duration::ZERO).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(recorder.inputs, [Input::Press(0x71)]);
    }
}
