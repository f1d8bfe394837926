#![no_main]
use balancer_core::Command;
use balancer_core::protocol::codec;
use balancer_core::protocol::rx::{RxBuffer, RxEngine, Scan};
use libfuzzer_sys::fuzz_target;

// First byte picks the chunk size so partial deliveries are covered too.
fuzz_target!(|data: &[u8]| {
    let Some((&chunk, bytes)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk % 64) + 1;
    let mut buf = RxBuffer::with_capacity(256);
    let mut engine = RxEngine::new();

    for piece in bytes.chunks(chunk) {
        let mut rest = piece;
        while !rest.is_empty() {
            let n = buf.extend_from_slice(rest);
            rest = &rest[n..];
            loop {
                match engine.scan(&mut buf, |_| {}) {
                    Scan::Complete(range) => {
                        assert!(range.end <= buf.capacity());
                        let _ = codec::decode::<Command>(buf.payload(range));
                    }
                    Scan::NoData => break,
                    Scan::InProgress => {
                        if buf.unscanned() == 0 {
                            break;
                        }
                    }
                    Scan::Oversized { .. } | Scan::Overrun => {}
                }
            }
            let (tail, head) = buf.cursors();
            assert!(tail <= head && head <= buf.capacity());
            if n == 0 && buf.unscanned() == 0 {
                // Buffer full of an incomplete frame that can never finish: drop
                // the piece, the way the hardware FIFO would.
                break;
            }
        }
    }
});
