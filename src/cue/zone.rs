use std::fmt;

use crate::detect::BoundingBox;

/// Horizontal third of the frame, selecting which cue plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Left => "LEFT",
            Zone::Center => "CENTER",
            Zone::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone for a box in a frame `frame_width` pixels wide.
///
/// `center < W/3` is LEFT, `center > 2W/3` is RIGHT, everything else
/// (including both exact thirds) is CENTER. Compared as `3 * center` against
/// `W` and `2W` so no rounding enters the boundaries.
pub fn zone_for(bbox: &BoundingBox, frame_width: u32) -> Zone {
    let scaled = 3 * bbox.center_x() as u64;
    let width = frame_width as u64;
    if scaled < width {
        Zone::Left
    } else if scaled > 2 * width {
        Zone::Right
    } else {
        Zone::Center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_at(cx: u32) -> BoundingBox {
        BoundingBox::new(cx - 10, 0, cx + 10, 20)
    }

    #[test]
    fn thirds_of_a_300px_frame() {
        assert_eq!(zone_for(&centered_at(50), 300), Zone::Left);
        assert_eq!(zone_for(&centered_at(150), 300), Zone::Center);
        assert_eq!(zone_for(&centered_at(280), 300), Zone::Right);
    }

    #[test]
    fn exact_thirds_fall_to_center() {
        assert_eq!(zone_for(&centered_at(100), 300), Zone::Center);
        assert_eq!(zone_for(&centered_at(200), 300), Zone::Center);
        assert_eq!(zone_for(&centered_at(99), 300), Zone::Left);
        assert_eq!(zone_for(&centered_at(201), 300), Zone::Right);
    }

    #[test]
    fn boundaries_are_exact_for_widths_not_divisible_by_three() {
        // W/3 = 33.3.., so a center of 33 is still LEFT.
        assert_eq!(zone_for(&centered_at(33), 100), Zone::Left);
        assert_eq!(zone_for(&centered_at(34), 100), Zone::Center);
        // 2W/3 = 66.6.., so 66 is CENTER and 67 is RIGHT.
        assert_eq!(zone_for(&centered_at(66), 100), Zone::Center);
        assert_eq!(zone_for(&centered_at(67), 100), Zone::Right);
    }

    #[test]
    fn zone_names() {
        assert_eq!(Zone::Left.to_string(), "LEFT");
        assert_eq!(Zone::Center.to_string(), "CENTER");
        assert_eq!(Zone::Right.to_string(), "RIGHT");
    }
}
