use std::collections::HashMap;

use super::keyframe::Keyframe;

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedKeyframe<K> {
    pub keyframe: K,
    /// The track has no keyframe left.
    pub track_emptied: bool,
}

/// Where a query time falls relative to the keyframes of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket<'a, K> {
    Empty,
    /// The time hits a keyframe, or lies outside the track and clamps to an end.
    Single(&'a K),
    Between(&'a K, &'a K),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<K> {
    pub name: String,
    keyframes: HashMap<u32, K>,
    ordered_frame_index: Vec<u32>,
}

impl<K> KeyframeTrack<K>
where
    K: Keyframe,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            keyframes: HashMap::new(),
            ordered_frame_index: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.ordered_frame_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_frame_index.is_empty()
    }

    /// Inserts keeping the frame order. Returns the keyframe previously stored at the same frame
    /// index.
    pub fn insert(&mut self, keyframe: K) -> Option<K> {
        let frame_index = keyframe.frame_index();
        let old = self.keyframes.insert(frame_index, keyframe);
        if old.is_none() {
            let pos = self
                .ordered_frame_index
                .binary_search(&frame_index)
                .unwrap_or_else(|e| e);
            self.ordered_frame_index.insert(pos, frame_index);
        }
        old
    }

    pub fn remove(&mut self, frame_index: u32) -> Option<RemovedKeyframe<K>> {
        let keyframe = self.keyframes.remove(&frame_index)?;
        if let Ok(pos) = self.ordered_frame_index.binary_search(&frame_index) {
            self.ordered_frame_index.remove(pos);
        }
        Some(RemovedKeyframe {
            keyframe,
            track_emptied: self.ordered_frame_index.is_empty(),
        })
    }

    pub fn find(&self, frame_index: u32) -> Option<&K> {
        self.ordered_frame_index
            .binary_search(&frame_index)
            .ok()
            .and_then(|_| self.keyframes.get(&frame_index))
    }

    pub fn first(&self) -> Option<&K> {
        self.ordered_frame_index
            .first()
            .and_then(|idx| self.keyframes.get(idx))
    }

    pub fn last(&self) -> Option<&K> {
        self.ordered_frame_index
            .last()
            .and_then(|idx| self.keyframes.get(idx))
    }

    pub fn min_frame_index(&self) -> Option<u32> {
        self.ordered_frame_index.first().copied()
    }

    pub fn max_frame_index(&self) -> Option<u32> {
        self.ordered_frame_index.last().copied()
    }

    pub fn frame_indices(&self) -> &[u32] {
        &self.ordered_frame_index
    }

    /// Keyframes in frame order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.ordered_frame_index
            .iter()
            .filter_map(|idx| self.keyframes.get(idx))
    }

    pub fn search_closest(&self, time: f32) -> Bracket<'_, K> {
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Bracket::Empty,
        };
        if time <= first.frame_index() as f32 {
            return Bracket::Single(first);
        }
        if time >= last.frame_index() as f32 {
            return Bracket::Single(last);
        }
        // first < time < last, so there is a keyframe on both sides
        let pos = self
            .ordered_frame_index
            .partition_point(|idx| (*idx as f32) <= time);
        let prev = self.keyframes.get(&self.ordered_frame_index[pos - 1]);
        let next = self.keyframes.get(&self.ordered_frame_index[pos]);
        match (prev, next) {
            (Some(prev), Some(_)) if prev.frame_index() as f32 == time => Bracket::Single(prev),
            (Some(prev), Some(next)) => Bracket::Between(prev, next),
            (Some(prev), None) => Bracket::Single(prev),
            (None, Some(next)) => Bracket::Single(next),
            (None, None) => Bracket::Empty,
        }
    }
}

/// Tracks of one keyframe kind keyed by target name.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionTrackBundle<K> {
    pub tracks: HashMap<String, KeyframeTrack<K>>,
}

impl<K> Default for MotionTrackBundle<K> {
    fn default() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }
}

impl<K> MotionTrackBundle<K>
where
    K: Keyframe,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyframe_len(&self) -> usize {
        self.tracks.values().map(|track| track.len()).sum()
    }

    pub fn get(&self, name: &str) -> Option<&KeyframeTrack<K>> {
        self.tracks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tracks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.tracks.keys()
    }

    pub fn force_add_keyframe(&mut self, keyframe: K, track_name: &str) -> Option<K> {
        self.tracks
            .entry(track_name.to_owned())
            .or_insert_with(|| KeyframeTrack::new(track_name))
            .insert(keyframe)
    }

    pub fn remove_keyframe(&mut self, frame_index: u32, track_name: &str) -> Option<RemovedKeyframe<K>> {
        self.tracks
            .get_mut(track_name)
            .and_then(|track| track.remove(frame_index))
    }

    pub fn find_keyframe(&self, frame_index: u32, track_name: &str) -> Option<&K> {
        self.tracks
            .get(track_name)
            .and_then(|track| track.find(frame_index))
    }

    pub fn max_frame_index(&self) -> Option<u32> {
        self.tracks
            .values()
            .filter_map(|track| track.max_frame_index())
            .max()
    }

    /// Drops tracks without keyframes and returns their names.
    pub fn prune_empty(&mut self) -> Vec<String> {
        let names: Vec<String> = self
            .tracks
            .iter()
            .filter(|(_, track)| track.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.tracks.remove(name);
        }
        names
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::keyframe::MorphKeyframe;

    fn morph(frame_index: u32, weight: f32) -> MorphKeyframe {
        MorphKeyframe {
            frame_index,
            weight,
        }
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut track = KeyframeTrack::new("smile");
        assert_eq!(None, track.insert(morph(30, 0.5f32)));
        assert_eq!(None, track.insert(morph(10, 0.1f32)));
        assert_eq!(None, track.insert(morph(20, 0.2f32)));
        assert_eq!(&[10, 20, 30], track.frame_indices());
        assert_eq!(Some(morph(20, 0.2f32)), track.insert(morph(20, 0.9f32)));
        assert_eq!(3, track.len());
        assert_eq!(Some(&morph(20, 0.9f32)), track.find(20));
        assert_eq!(None, track.find(21));
    }

    #[test]
    fn test_remove_reports_empty() {
        let mut track = KeyframeTrack::new("smile");
        track.insert(morph(0, 0f32));
        track.insert(morph(5, 1f32));
        let removed = track.remove(0).unwrap();
        assert!(!removed.track_emptied);
        assert_eq!(None, track.remove(0));
        let removed = track.remove(5).unwrap();
        assert!(removed.track_emptied);
        assert!(track.is_empty());
        assert_eq!(Bracket::Empty, track.search_closest(3f32));
    }

    #[test]
    fn test_search_closest() {
        let mut track = KeyframeTrack::new("smile");
        track.insert(morph(10, 0f32));
        track.insert(morph(50, 1f32));
        track.insert(morph(20, 1f32));
        assert_eq!(Bracket::Single(&morph(10, 0f32)), track.search_closest(0f32));
        assert_eq!(Bracket::Single(&morph(50, 1f32)), track.search_closest(60f32));
        assert_eq!(Bracket::Single(&morph(20, 1f32)), track.search_closest(20f32));
        assert_eq!(
            Bracket::Between(&morph(10, 0f32), &morph(20, 1f32)),
            track.search_closest(12.5f32)
        );
        assert_eq!(
            Bracket::Between(&morph(20, 1f32), &morph(50, 1f32)),
            track.search_closest(20.5f32)
        );
    }

    #[test]
    fn test_bundle_max_frame_index_and_prune() {
        let mut bundle = MotionTrackBundle::new();
        bundle.force_add_keyframe(morph(10, 0f32), "a");
        bundle.force_add_keyframe(morph(40, 0f32), "b");
        assert_eq!(Some(40), bundle.max_frame_index());
        bundle.remove_keyframe(40, "b");
        assert_eq!(Some(10), bundle.max_frame_index());
        assert_eq!(vec!["b".to_owned()], bundle.prune_empty());
        assert_eq!(1, bundle.keyframe_len());
    }
}
