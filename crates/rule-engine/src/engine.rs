//! Core rule engine

use crate::model::{
    AutomationAction, Brightness, CommandType, EventType, IntegrationEvent, ALL_ZONES, ZONE_1,
    ZONE_2,
};

/// Brightness applied when motion is detected (~80%)
pub const MOTION_BRIGHTNESS: u8 = 200;
/// Brightness forced when the doorbell rings
pub const DOORBELL_BRIGHTNESS: u8 = 255;

/// Maps integration events to at most one automation action.
///
/// The engine holds no state; every call is independent and it can be
/// shared freely between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    /// Create a new rule engine
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an event, returning the action to forward to the executor.
    ///
    /// `None` means no rule applies and nothing should be sent.
    pub fn evaluate(&self, event: &IntegrationEvent) -> Option<AutomationAction> {
        tracing::debug!(
            "Processing {} event {} from {}",
            event.event_type,
            event.event_id,
            event.source_id
        );

        match &event.event_type {
            EventType::Motion => Some(self.handle_motion()),
            EventType::Doorbell => Some(self.handle_doorbell()),
            EventType::Alexa => Some(self.handle_alexa()),
            EventType::Generic | EventType::Unrecognized(_) => {
                tracing::warn!("No rule for event type {}", event.event_type);
                None
            }
        }
    }

    /// Motion lights the entryway only and respects any global dimming scene
    fn handle_motion(&self) -> AutomationAction {
        AutomationAction::new(
            CommandType::SetBrightness,
            MOTION_BRIGHTNESS,
            &[ZONE_1],
            Brightness::Inherit,
        )
    }

    /// Doorbell forces full brightness on both zones regardless of scene
    fn handle_doorbell(&self) -> AutomationAction {
        AutomationAction::new(
            CommandType::SetBrightness,
            DOORBELL_BRIGHTNESS,
            &[ZONE_1, ZONE_2],
            Brightness::Override {
                level: DOORBELL_BRIGHTNESS,
            },
        )
    }

    /// Voice assistant powers on everything
    fn handle_alexa(&self) -> AutomationAction {
        AutomationAction::new(CommandType::Power, true, &[ALL_ZONES], Brightness::Inherit)
    }
}
