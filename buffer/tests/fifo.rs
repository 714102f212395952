//! FIFO and sizing invariants under long mixed workloads.
//! Run with: cargo test -p blockring-buffer --test fifo

use std::collections::VecDeque;

use blockring_buffer::{
    BufferConfig, BufferError, DynBuffer, HoldBuffer, NoShiftBuffer, PolicyKind, ShiftBuffer,
};

struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

fn check_invariants(buf: &DynBuffer<i32>, kind: PolicyKind) {
    let bs = buf.block_size();
    assert_eq!(buf.buffer_size() % bs, 0, "{kind}");
    assert_eq!(buf.buffer_size(), buf.block_count() * bs, "{kind}");
    assert!(buf.data_size() <= buf.buffer_size(), "{kind}");
    assert!(buf.buffer_size() <= buf.maximum_buffer_size(), "{kind}");
    match kind {
        PolicyKind::Shift => assert!(buf.slack() <= bs, "{kind}: slack {}", buf.slack()),
        PolicyKind::NoShift => {
            assert!(buf.buffer_size() >= bs, "{kind}");
            assert!(buf.slack() < 2 * bs, "{kind}: slack {}", buf.slack());
        }
        PolicyKind::Hold => assert!(buf.buffer_size() >= bs, "{kind}"),
    }
}

/// Drives `buf` with bursts of writes and reads, checking it against a
/// `VecDeque` model after every operation.
fn run_workload(mut buf: DynBuffer<i32>, kind: PolicyKind, seed: u64, ops: usize) {
    let mut rng = Lcg(seed);
    let mut model = VecDeque::new();
    let mut next_value = 0i32;
    let max = buf.maximum_buffer_size();

    let mut done = 0;
    while done < ops {
        let burst = 1 + rng.below(3 * buf.block_size() as u32) as usize;
        let writing = rng.below(2) == 0;
        for _ in 0..burst {
            if writing {
                let result = buf.write(next_value);
                if model.len() == max {
                    assert_eq!(
                        result,
                        Err(BufferError::CapacityExhausted { maximum: max }),
                        "{kind}"
                    );
                } else {
                    assert_eq!(result, Ok(()), "{kind}");
                    model.push_back(next_value);
                    next_value += 1;
                }
            } else {
                let result = buf.read();
                match model.pop_front() {
                    Some(expected) => assert_eq!(result, Ok(expected), "{kind}"),
                    None => assert_eq!(result, Err(BufferError::Empty), "{kind}"),
                }
            }
            assert_eq!(buf.data_size(), model.len(), "{kind}");
            check_invariants(&buf, kind);
            done += 1;
        }
    }

    assert_eq!(buf.to_vec(), model.iter().copied().collect::<Vec<_>>(), "{kind}");
    while let Some(expected) = model.pop_front() {
        assert_eq!(buf.read(), Ok(expected), "{kind}");
        check_invariants(&buf, kind);
    }
    assert_eq!(buf.read(), Err(BufferError::Empty), "{kind}");
}

#[test]
fn random_workload_all_policies() {
    let configs = [(1, 1), (1, 7), (2, 3), (3, 10), (4, 64), (32, 1024)];
    for (i, &(block_size, maximum)) in configs.iter().enumerate() {
        for kind in PolicyKind::ALL {
            for hold_window in [None, Some(0), Some(16)] {
                let buf = DynBuffer::from_kind(
                    BufferConfig::new(block_size, maximum),
                    -1,
                    kind,
                    hold_window,
                )
                .unwrap();
                run_workload(buf, kind, 0x5eed + i as u64, 5_000);
            }
        }
    }
}

#[test]
fn counters_balance_after_drain() {
    for kind in PolicyKind::ALL {
        let mut buf = DynBuffer::from_kind(BufferConfig::new(4, 40), 0u8, kind, Some(0)).unwrap();
        for round in 0..5u8 {
            for v in 0..40 {
                buf.write(v + round).unwrap();
            }
            for v in 0..40 {
                assert_eq!(buf.read(), Ok(v + round), "{kind}");
            }
            // One extra call lets the hold policy settle.
            assert!(buf.read().is_err());
        }
        let stats = buf.stats();
        assert_eq!(
            stats.blocks_allocated - stats.blocks_released,
            stats.block_count as u64,
            "{kind}"
        );
        assert_eq!(stats.data_size, 0);
    }
}

#[test]
fn hold_survives_oscillation() {
    let window = 64;
    let mut buf = HoldBuffer::with_hold_window(4, 64, -1i32, window).unwrap();
    for v in 0..16 {
        buf.write(v).unwrap();
    }
    let held = buf.buffer_size();
    assert_eq!(buf.policy().hold_value(), 5);

    // Requirement dips below the hold value for a few operations per cycle,
    // far shorter than the window.
    let mut last = held;
    for _ in 0..200 {
        for _ in 0..4 {
            buf.read().unwrap();
            assert!(buf.buffer_size() >= last);
            last = buf.buffer_size();
        }
        for v in 0..4 {
            buf.write(v).unwrap();
            assert!(buf.buffer_size() >= last);
            last = buf.buffer_size();
        }
    }
    assert_eq!(buf.buffer_size(), held);

    // A sustained drop shrinks once the window has elapsed.
    for _ in 0..(16 + window + 20) {
        let _ = buf.read();
    }
    assert_eq!(buf.block_count(), 1);
    assert_eq!(buf.buffer_size(), 4);
}

#[test]
fn no_shift_oscillates_at_block_boundary() {
    // Without hysteresis a workload straddling a block boundary adds and
    // removes a block every cycle.
    let mut buf = NoShiftBuffer::new(4, 64, -1i32).unwrap();
    for v in 0..4 {
        buf.write(v).unwrap();
    }
    let base = buf.stats().blocks_allocated;
    for cycle in 0..10 {
        buf.write(cycle).unwrap();
        buf.read().unwrap();
        buf.read().unwrap();
        buf.write(cycle).unwrap();
    }
    assert!(buf.stats().blocks_allocated > base);
    assert_eq!(buf.data_size(), 4);
}

#[test]
fn shift_priming_keeps_cursors_coherent() {
    let mut buf = ShiftBuffer::new(3, 6, -1i32).unwrap();
    for round in 0..10 {
        buf.write(round).unwrap();
        assert_eq!(buf.read(), Ok(round));
        assert_eq!(buf.block_count(), 0);
    }
    for v in 0..6 {
        buf.write(v).unwrap();
    }
    assert!(buf.is_full());
    assert_eq!(buf.to_vec(), vec![0, 1, 2, 3, 4, 5]);
}

fn dyn_buffer(block_size: usize, maximum: usize, kind: PolicyKind) -> DynBuffer<i32> {
    DynBuffer::from_kind(BufferConfig::new(block_size, maximum), -1, kind, None).unwrap()
}

#[test]
fn scenarios_all_policies() {
    for kind in PolicyKind::ALL {
        let mut buf = dyn_buffer(2, 2, kind);
        assert_eq!(buf.read(), Err(BufferError::Empty), "{kind}");
        buf.write(1).unwrap();
        buf.write(2).unwrap();
        assert!(matches!(buf.write(3), Err(BufferError::CapacityExhausted { .. })));
        assert_eq!(buf.read(), Ok(1));
        assert_eq!(buf.read(), Ok(2));
        assert_eq!(buf.read(), Err(BufferError::Empty));

        let mut buf = dyn_buffer(3, 6, kind);
        buf.write(1).unwrap();
        assert_eq!(buf.read(), Ok(1));
        for v in 0..6 {
            buf.write(v).unwrap();
        }
        assert!(buf.write(6).is_err(), "{kind}");
        for v in 0..6 {
            assert_eq!(buf.read(), Ok(v), "{kind}");
        }
        assert_eq!(buf.read(), Err(BufferError::Empty));

        let mut buf = dyn_buffer(2, 3, kind);
        assert_eq!(buf.maximum_buffer_size(), 4);
        buf.write(1).unwrap();
        buf.write(2).unwrap();
        buf.read().unwrap();
        buf.read().unwrap();
        for v in 1..=4 {
            buf.write(v).unwrap();
        }
        assert!(buf.write(5).is_err(), "{kind}");
        for v in 1..=4 {
            assert_eq!(buf.read(), Ok(v), "{kind}");
        }
        assert_eq!(buf.read(), Err(BufferError::Empty));
        assert_eq!(buf.buffer_size() % 2, 0);
    }
}
