//! Signals received by the supervisor reach the child.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;

use crashwatch::signals::{SignalRelay, RELAYED};

#[tokio::test]
async fn forwards_signal_to_child() {
    let mut child = Command::new("sleep")
        .arg("30")
        .stdin(Stdio::null())
        .spawn()
        .expect("spawn sleep");
    let pid = child.id().expect("child pid");

    let relay = SignalRelay::start(pid);
    assert_eq!(relay.len(), RELAYED.len());

    // Default action for SIGALRM terminates the child.
    kill(Pid::this(), Signal::SIGALRM).expect("signal self");

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("child should die from the forwarded signal")
        .expect("wait");
    assert_eq!(status.signal(), Some(Signal::SIGALRM as i32));

    relay.stop();
}
