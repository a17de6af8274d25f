use std::ops::{Add, AddAssign, Mul};

// The smallest unit of audio; one interleaved stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const ZERO: StereoFrame = StereoFrame { left: 0.0, right: 0.0 };

    pub fn mono(v: f32) -> Self {
        Self { left: v, right: v }
    }

    // gentle tanh limiter on the master, keeps stacked voices out of hard clipping
    pub fn soft_clip(self) -> Self {
        Self {
            left: self.left.tanh(),
            right: self.right.tanh(),
        }
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

impl AddAssign for StereoFrame {
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    fn mul(self, gain: f32) -> StereoFrame {
        StereoFrame {
            left: self.left * gain,
            right: self.right * gain,
        }
    }
}
