use balancer_hardware::sim_serial;
use balancer_traits::{ByteSink, ByteSource};
use rstest::rstest;
use std::thread;
use std::time::Duration;

#[rstest]
#[case(64, 10, 10)]
#[case(64, 64, 64)]
#[case(8, 20, 8)]
fn host_send_is_limited_by_fifo(#[case] fifo: usize, #[case] len: usize, #[case] accepted: usize) {
    let (rx, _tx, host) = sim_serial(fifo, fifo);
    let payload = vec![0xA5u8; len];
    assert_eq!(host.send(&payload), accepted);
    assert_eq!(rx.available(), accepted);
    assert_eq!(rx.capacity(), fifo);
}

#[test]
fn blocking_write_completes_once_host_drains() {
    let (_rx, mut tx, host) = sim_serial(4, 4);
    let reader = thread::spawn(move || {
        let mut got = Vec::new();
        while let Some(b) = host.recv_timeout(Duration::from_millis(500)) {
            got.push(b);
            if got.len() == 16 {
                break;
            }
        }
        got
    });
    let frame: Vec<u8> = (0u8..16).collect();
    tx.write_all(&frame).unwrap();
    assert_eq!(reader.join().unwrap(), frame);
}

#[test]
fn read_after_host_hangup_reports_disconnect() {
    let (mut rx, _tx, host) = sim_serial(4, 4);
    drop(host);
    let mut buf = [0u8; 4];
    assert!(rx.read(&mut buf).is_err());
}
