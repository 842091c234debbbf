//! Constant-speed path following for animated persons.
//!
//! Each person walks its waypoint list back and forth ("ping-pong"). The
//! per-person state is `(current_segment_index, direction, progress)`:
//! - the active segment runs from `path[index]` to `path[index ± 1]`
//!   depending on `direction`
//! - `progress` is the covered fraction of that segment, kept in `[0, 1]`
//! - reaching the end snaps onto the waypoint, steps the index, resets
//!   progress and reverses direction when the new index is a path end
//!
//! Persons with fewer than two waypoints are skipped without error.

use embassy_time::Duration;
use log::debug;

use super::geometry::{distance, lerp_point};
use super::types::{Person, Point};

/// What a single [`advance`] call did to a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStep {
    /// Degenerate path or no usable speed/time; state untouched.
    Skipped,
    /// Moved along the current segment without reaching its end.
    Moved,
    /// Arrived at the waypoint with this index.
    WaypointReached(usize),
}

/// Bring a possibly stale animation state back into a valid shape.
///
/// Index and progress are clamped, and a direction pointing off the end of
/// the path is reversed. Returns `false` for degenerate paths.
fn normalize(person: &mut Person) -> bool {
    let len = person.path.len();
    if len < 2 {
        return false;
    }
    if person.current_segment_index >= len {
        person.current_segment_index = len - 1;
    }
    if !person.progress.is_finite() {
        person.progress = 0.0;
    }
    person.progress = person.progress.clamp(0.0, 1.0);
    if person.direction.step(person.current_segment_index, len).is_none() {
        person.direction = person.direction.reversed();
    }
    true
}

/// Index of the segment end in the current direction, after normalizing.
fn segment_end_index(person: &Person) -> Option<usize> {
    let len = person.path.len();
    if len < 2 {
        return None;
    }
    let index = person.current_segment_index.min(len - 1);
    person
        .direction
        .step(index, len)
        .or_else(|| person.direction.reversed().step(index, len))
}

/// Start and end of the segment the person is currently walking.
pub fn current_segment(person: &Person) -> Option<(Point, Point)> {
    let end = segment_end_index(person)?;
    let start = person.current_segment_index.min(person.path.len() - 1);
    Some((person.path[start], person.path[end]))
}

/// Interpolated position: `start + (end - start) * progress`.
///
/// `None` for degenerate persons, which take no part in detection.
pub fn current_position(person: &Person) -> Option<Point> {
    let (start, end) = current_segment(person)?;
    let progress = if person.progress.is_finite() { person.progress.clamp(0.0, 1.0) } else { 0.0 };
    Some(lerp_point(&start, &end, progress))
}

/// Snap onto waypoint `index` and prepare the next segment.
fn arrive(person: &mut Person, index: usize) {
    let last = person.path.len() - 1;
    person.current_segment_index = index;
    person.progress = 0.0;
    if index == 0 || index == last {
        person.direction = person.direction.reversed();
    }
}

/// Advance one person by `dt` of simulated time.
pub fn advance(person: &mut Person, dt: Duration) -> AnimationStep {
    if !normalize(person) {
        debug!("Person {} has a degenerate path ({} waypoints), not animating", person.id, person.path.len());
        return AnimationStep::Skipped;
    }
    let Some(end_index) = segment_end_index(person) else {
        return AnimationStep::Skipped;
    };

    let start = person.path[person.current_segment_index];
    let end = person.path[end_index];
    let length = distance(&start, &end);

    // Duplicate waypoints: hop over them without moving this tick
    if length == 0.0 {
        arrive(person, end_index);
        return AnimationStep::WaypointReached(end_index);
    }

    let seconds = dt.as_micros() as f64 / 1_000_000.0;
    if seconds <= 0.0 || !person.speed.is_finite() || person.speed <= 0.0 {
        return AnimationStep::Skipped;
    }

    person.progress += (person.speed * seconds) / length;
    if person.progress >= 1.0 {
        arrive(person, end_index);
        AnimationStep::WaypointReached(end_index)
    } else {
        AnimationStep::Moved
    }
}

/// Advance every person; returns how many were actually animated.
pub fn advance_all(persons: &mut [Person], dt: Duration) -> usize {
    persons
        .iter_mut()
        .map(|person| advance(person, dt))
        .filter(|step| *step != AnimationStep::Skipped)
        .count()
}
