use super::ChunkSplitter;

/// Triggers exactly every `size` bytes
#[derive(Debug, Clone)]
pub struct FixedSizeSplitter {
    size: u64,
    position: u64,
    triggered: bool,
}

impl FixedSizeSplitter {
    pub fn new(size: u64) -> Self {
        Self {
            size: size.max(1),
            position: 0,
            triggered: false,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl ChunkSplitter for FixedSizeSplitter {
    fn update(&mut self, _byte: u8) -> bool {
        self.position += 1;
        if self.position >= self.size {
            self.triggered = true;
        }
        self.triggered
    }

    fn is_triggered(&self) -> bool {
        self.triggered
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn reset(&mut self) {
        self.position = 0;
        self.triggered = false;
    }

    fn new_instance(&self) -> Box<dyn ChunkSplitter> {
        Box::new(Self::new(self.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;

    #[quickcheck]
    fn triggers_every_n_bytes(size: u8, len: u16) -> TestResult {
        if size == 0 {
            return TestResult::discard();
        }
        let data = vec![0u8; len as usize];
        let mut splitter = FixedSizeSplitter::new(size as u64);
        let found = crate::splitter::tests::boundaries(&mut splitter, &data);
        let expected = (1..=(len as usize / size as usize))
            .map(|i| i * size as usize)
            .collect::<Vec<_>>();
        TestResult::from_bool(found == expected)
    }

    #[test]
    fn stays_triggered_until_reset() {
        let mut splitter = FixedSizeSplitter::new(2);
        assert!(!splitter.update(1));
        assert!(splitter.update(2));
        assert!(splitter.update(3));
        assert_eq!(splitter.position(), 3);
        splitter.reset();
        assert!(!splitter.is_triggered());
        assert_eq!(splitter.position(), 0);
    }
}
