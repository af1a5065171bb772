use serde::Serialize;

/// Controls-allowed engagement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Engagement {
    Disengaged,
    Engaged,
}

/// What drove the most recent transition, for the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngagementTrigger {
    StockCruiseEngage,
    StockCruiseDisengage,
    MainSwitchOff,
    ButtonEngage,
    CancelButton,
    ExternalRelease,
}

/// Cruise engagement state machine.
///
/// Starts Disengaged at init. Button edges are detected against the previous
/// sample of each signal; the first observation of a signal only establishes
/// its baseline and is never an edge.
#[derive(Debug, Clone, Copy)]
pub struct EngagementTracker {
    state: Engagement,
    cruise_engaged_prev: bool,
    set_prev: Option<bool>,
    resume_prev: Option<bool>,
    cancel_prev: Option<bool>,
}

impl EngagementTracker {
    pub fn new() -> Self {
        Self {
            state: Engagement::Disengaged,
            cruise_engaged_prev: false,
            set_prev: None,
            resume_prev: None,
            cancel_prev: None,
        }
    }

    pub fn engaged(&self) -> bool {
        self.state == Engagement::Engaged
    }

    pub fn state(&self) -> Engagement {
        self.state
    }

    /// Stock-cruise path: enter controls on the rising edge of the stock
    /// system engaging, exit whenever it reports not engaged.
    pub fn update_stock_cruise(&mut self, cruise_engaged: bool) -> Option<EngagementTrigger> {
        let mut transition = None;
        if cruise_engaged && !self.cruise_engaged_prev && !self.engaged() {
            self.state = Engagement::Engaged;
            transition = Some(EngagementTrigger::StockCruiseEngage);
        }
        if !cruise_engaged && self.engaged() {
            self.state = Engagement::Disengaged;
            transition = Some(EngagementTrigger::StockCruiseDisengage);
        }
        self.cruise_engaged_prev = cruise_engaged;
        transition
    }

    /// Main switch off always exits controls, on any path.
    pub fn update_main_switch(&mut self, acc_main_on: bool) -> Option<EngagementTrigger> {
        if !acc_main_on && self.engaged() {
            self.state = Engagement::Disengaged;
            return Some(EngagementTrigger::MainSwitchOff);
        }
        None
    }

    /// Button path, evaluated on each validated button message.
    ///
    /// With the alternate longitudinal mode enabled, a falling edge of Set
    /// or Resume engages while the main switch is on. A rising edge of
    /// Cancel always disengages, unconditionally.
    pub fn update_buttons(
        &mut self,
        set: bool,
        resume: bool,
        cancel: bool,
        acc_main_on: bool,
        alternate_longitudinal: bool,
    ) -> Option<EngagementTrigger> {
        let mut transition = None;

        if alternate_longitudinal {
            let set_falling = self.set_prev == Some(true) && !set;
            let resume_falling = self.resume_prev == Some(true) && !resume;
            if (set_falling || resume_falling) && acc_main_on && !self.engaged() {
                self.state = Engagement::Engaged;
                transition = Some(EngagementTrigger::ButtonEngage);
            }
        }

        let cancel_rising = self.cancel_prev == Some(false) && cancel;
        if cancel_rising && self.engaged() {
            self.state = Engagement::Disengaged;
            transition = Some(EngagementTrigger::CancelButton);
        }

        self.set_prev = Some(set);
        self.resume_prev = Some(resume);
        self.cancel_prev = Some(cancel);
        transition
    }

    /// Generic disengage raised by the outer gateway (brake application,
    /// fault handling and similar cross-platform conditions).
    pub fn release(&mut self) -> Option<EngagementTrigger> {
        if self.engaged() {
            self.state = Engagement::Disengaged;
            return Some(EngagementTrigger::ExternalRelease);
        }
        None
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for EngagementTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disengaged() {
        assert!(!EngagementTracker::new().engaged());
    }

    #[test]
    fn stock_cruise_rising_edge_engages_level_off_disengages() {
        let mut tracker = EngagementTracker::new();
        assert_eq!(
            tracker.update_stock_cruise(true),
            Some(EngagementTrigger::StockCruiseEngage)
        );
        assert!(tracker.engaged());

        // Held high: no new transition.
        assert_eq!(tracker.update_stock_cruise(true), None);
        assert!(tracker.engaged());

        assert_eq!(
            tracker.update_stock_cruise(false),
            Some(EngagementTrigger::StockCruiseDisengage)
        );
        assert!(!tracker.engaged());
    }

    #[test]
    fn main_switch_off_always_disengages() {
        let mut tracker = EngagementTracker::new();
        tracker.update_stock_cruise(true);
        assert!(tracker.engaged());
        assert_eq!(
            tracker.update_main_switch(false),
            Some(EngagementTrigger::MainSwitchOff)
        );
        assert!(!tracker.engaged());
        // Off while already disengaged is a no-op.
        assert_eq!(tracker.update_main_switch(false), None);
    }

    #[test]
    fn resume_falling_edge_engages_with_main_on() {
        let mut tracker = EngagementTracker::new();
        // Baseline sample: pressed. Not an edge.
        assert_eq!(tracker.update_buttons(false, true, false, true, true), None);
        assert!(!tracker.engaged());
        // Release: falling edge with main on.
        assert_eq!(
            tracker.update_buttons(false, false, false, true, true),
            Some(EngagementTrigger::ButtonEngage)
        );
        assert!(tracker.engaged());
    }

    #[test]
    fn resume_falling_edge_without_main_does_not_engage() {
        let mut tracker = EngagementTracker::new();
        tracker.update_buttons(false, true, false, false, true);
        assert_eq!(tracker.update_buttons(false, false, false, false, true), None);
        assert!(!tracker.engaged());
    }

    #[test]
    fn button_edges_ignored_without_alternate_longitudinal() {
        let mut tracker = EngagementTracker::new();
        tracker.update_buttons(true, false, false, true, false);
        assert_eq!(tracker.update_buttons(false, false, false, true, false), None);
        assert!(!tracker.engaged());
    }

    #[test]
    fn cancel_rising_edge_always_disengages() {
        let mut tracker = EngagementTracker::new();
        tracker.update_stock_cruise(true);
        assert!(tracker.engaged());

        // Cancel pressed together with everything else held: still exits.
        tracker.update_buttons(true, true, false, true, true);
        assert_eq!(
            tracker.update_buttons(true, true, true, true, true),
            Some(EngagementTrigger::CancelButton)
        );
        assert!(!tracker.engaged());
    }

    #[test]
    fn first_cancel_observation_is_not_an_edge() {
        let mut tracker = EngagementTracker::new();
        tracker.update_stock_cruise(true);
        // First-ever button sample arrives with cancel already high.
        assert_eq!(tracker.update_buttons(false, false, true, true, false), None);
        assert!(tracker.engaged());
        // Release then press again: now a real edge.
        tracker.update_buttons(false, false, false, true, false);
        assert_eq!(
            tracker.update_buttons(false, false, true, true, false),
            Some(EngagementTrigger::CancelButton)
        );
        assert!(!tracker.engaged());
    }

    #[test]
    fn external_release_disengages() {
        let mut tracker = EngagementTracker::new();
        tracker.update_stock_cruise(true);
        assert_eq!(tracker.release(), Some(EngagementTrigger::ExternalRelease));
        assert!(!tracker.engaged());
        assert_eq!(tracker.release(), None);
    }
}
