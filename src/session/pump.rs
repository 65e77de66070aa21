//! Frame pump bookkeeping: skip cadence and the one-in-flight gate.

/// Counter and backpressure flag for one active session.
///
/// `in_flight` is set right before a frame is handed to the connection and
/// cleared only when the reply arrives or the send itself fails. There is no
/// timeout.
#[derive(Debug, Clone)]
pub struct FramePump {
    send_every_n: u32,
    frame_counter: u64,
    in_flight: bool,
}

impl FramePump {
    pub fn new(send_every_n: u32) -> Self {
        Self {
            send_every_n: send_every_n.max(1),
            frame_counter: 0,
            in_flight: false,
        }
    }

    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.in_flight = false;
    }

    /// Count a ready frame. Returns true when this frame should be sent.
    pub fn count_frame(&mut self) -> bool {
        self.frame_counter += 1;
        self.frame_counter % u64::from(self.send_every_n) == 0
    }

    pub fn mark_in_flight(&mut self) {
        debug_assert!(!self.in_flight, "second frame sent while one is in flight");
        self.in_flight = true;
    }

    /// The outstanding frame was answered (or never left).
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn send_every_n(&self) -> u32 {
        self.send_every_n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_fourth_frame_sent() {
        let mut pump = FramePump::new(4);
        let sent: Vec<u64> = (1..=10)
            .filter(|_| pump.count_frame())
            .collect();
        assert_eq!(sent, vec![4, 8]);
        assert_eq!(pump.frame_counter(), 10);
    }

    #[test]
    fn test_every_frame_when_n_is_one() {
        let mut pump = FramePump::new(1);
        assert!((0..5).all(|_| pump.count_frame()));
    }

    #[test]
    fn test_zero_cadence_treated_as_one() {
        let pump = FramePump::new(0);
        assert_eq!(pump.send_every_n(), 1);
    }

    #[test]
    fn test_reset_clears_counter_and_gate() {
        let mut pump = FramePump::new(2);
        pump.count_frame();
        pump.mark_in_flight();
        pump.reset();
        assert_eq!(pump.frame_counter(), 0);
        assert!(!pump.in_flight());
    }
}
