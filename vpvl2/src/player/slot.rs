use super::{
    options::{MotionConfiguration, MotionOptions},
    player::MotionPlayer,
    pose::{Pose, PoseLayout},
};

/// Named layer of a model's animation. Players are ordered oldest first; every newer player
/// fades in over the result of the older ones.
#[derive(Debug, Clone)]
pub struct MotionSlot {
    name: String,
    options: MotionOptions,
    players: Vec<MotionPlayer>,
    superseded: Vec<MotionPlayer>,
}

impl MotionSlot {
    pub fn new(name: &str, player: MotionPlayer) -> Self {
        Self {
            name: name.to_owned(),
            options: *player.options(),
            players: vec![player],
            superseded: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &MotionOptions {
        &self.options
    }

    pub fn players(&self) -> &[MotionPlayer] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The player added last.
    pub fn current(&self) -> Option<&MotionPlayer> {
        self.players.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut MotionPlayer> {
        self.players.last_mut()
    }

    pub fn push(&mut self, player: MotionPlayer) {
        self.options = *player.options();
        self.players.push(player);
    }

    /// Drops every player and starts over with `player`.
    pub fn replace(&mut self, player: MotionPlayer) {
        self.players.clear();
        self.push(player);
    }

    pub fn configure(&mut self, configuration: &MotionConfiguration) {
        configuration.apply(&mut self.options);
        for player in &mut self.players {
            configuration.apply(player.options_mut());
        }
    }

    pub fn advance(&mut self, delta: f32) {
        for player in &mut self.players {
            player.advance(delta);
        }
        // players under a completed fade in are no longer visible
        if let Some(index) = self.players.iter().rposition(|player| !player.is_fading()) {
            let superseded = self.players.drain(..index).filter(MotionPlayer::is_finished);
            self.superseded.extend(superseded);
        }
    }

    pub fn sample(&self, layout: &PoseLayout) -> Option<Pose> {
        let (first, rest) = self.players.split_first()?;
        let mut pose = first.sample(layout);
        for player in rest {
            pose = pose.crossfade(&player.sample(layout), player.fade_weight());
        }
        Some(pose)
    }

    /// Detaches finished players that nothing fades over any more. A finished player stays
    /// clamped on its last frame while it or a newer player is still fading in.
    pub fn take_finished(&mut self) -> Vec<MotionPlayer> {
        let mut finished = vec![];
        let mut index = self.players.len();
        let mut covered = false;
        while index > 0 {
            index -= 1;
            let player = &self.players[index];
            let fading = player.is_fading();
            if player.is_finished() && !fading && !covered {
                finished.push(self.players.remove(index));
            }
            covered |= fading;
        }
        finished.reverse();
        finished
    }

    /// Finished players that a completed crossfade pushed out of the slot.
    pub fn take_superseded(&mut self) -> Vec<MotionPlayer> {
        std::mem::take(&mut self.superseded)
    }
}
