/// Which half of a benchmark dataset a loader holds.
pub trait Split: Copy + Send + Sync {
    const NAME: &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Train;

#[derive(Debug, Clone, Copy, Default)]
pub struct Test;

impl Split for Train {
    const NAME: &'static str = "train";
}

impl Split for Test {
    const NAME: &'static str = "test";
}
