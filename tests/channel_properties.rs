//! Property tests for the bounded channel.

use linefold::channel::BoundedChannel;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Push(u16),
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u16>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    /// Any single-threaded interleaving that respects the blocking contract
    /// (never push when full, never pop when empty) behaves like a FIFO queue
    /// and never holds more than `capacity` items.
    #[test]
    fn fifo_and_bounded(capacity in 1usize..16, ops in prop::collection::vec(op(), 0..200)) {
        let channel = BoundedChannel::new(capacity);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) if model.len() < capacity => {
                    channel.push(v).unwrap();
                    model.push_back(v);
                }
                Op::Pop if !model.is_empty() => {
                    prop_assert_eq!(channel.pop().unwrap(), model.pop_front());
                }
                _ => {}
            }
            prop_assert!(channel.len() <= capacity);
            prop_assert_eq!(channel.len(), model.len());
        }

        channel.close();
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(channel.pop().unwrap(), Some(expected));
        }
        prop_assert_eq!(channel.pop().unwrap(), None);
        prop_assert_eq!(channel.pop().unwrap(), None);
    }

    /// Pushed and popped sequences match across threads for any capacity.
    #[test]
    fn fifo_across_threads(capacity in 1usize..8, values in prop::collection::vec(any::<u32>(), 0..300)) {
        let channel = BoundedChannel::new(capacity);

        let received = std::thread::scope(|s| {
            s.spawn(|| {
                for &v in &values {
                    channel.push(v).unwrap();
                }
                channel.close();
            });
            let mut received = Vec::new();
            while let Some(v) = channel.pop().unwrap() {
                received.push(v);
            }
            received
        });

        prop_assert_eq!(received, values);
        prop_assert!(channel.stats().high_water <= capacity);
    }

    /// Folding never lengthens a line and removes no non-marker characters.
    #[test]
    fn fold_never_grows(line in "[a+]{0,40}") {
        let folded = linefold::stage::fold_markers(&line, '+', '^');
        prop_assert!(folded.chars().count() <= line.chars().count());
        prop_assert_eq!(
            folded.chars().filter(|&c| c == 'a').count(),
            line.chars().filter(|&c| c == 'a').count()
        );
        prop_assert!(!folded.contains("++"));
    }
}
