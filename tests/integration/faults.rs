use crate::*;

use tether_core::LinkRole;
use tether_link::{ConnectionState, LinkError, SimFaults};

fn lossy(seed: u64, drop_rate: f64) -> CableConfig {
    CableConfig {
        faults: SimFaults {
            drop_rate,
            ..SimFaults::default()
        },
        ..seeded(seed)
    }
}

/// A dead line leaves the master with LinkLost while the other device keeps
/// ticking through negotiation.
#[tokio::test]
async fn test_dead_line_reports_link_lost() -> Result<()> {
    let deadline = WaitPolicy::Deadline(Duration::from_millis(100));
    let (mut cable, mut a, mut b) = rig(
        lossy(21, 1.0),
        Side::new(b"ABC", ScriptedConfirm::at(0)).with_policy(deadline),
        Side::new(b"XY", ScriptedConfirm::never()).with_policy(deadline),
    )?;

    let master = async {
        let result = a.run().await;
        let failed_at = cable.tick();
        let later = tokio::time::timeout(
            Duration::from_millis(300),
            cable.wait_for_boundary(failed_at + 100),
        )
        .await;
        (result, failed_at, later)
    };
    let watch_b = tokio::time::timeout(Duration::from_millis(500), b.run());
    let ((ra, failed_at, later), rb) = tokio::join!(master, watch_b);

    assert_eq!(
        ra.unwrap_err(),
        LinkError::LinkLost {
            state: ConnectionState::AwaitingRemote
        }
    );
    let later = later.with_context(|| format!("cable stalled at {failed_at}"))??;
    assert!(later >= failed_at + 100);
    assert!(rb.is_err(), "B must still be negotiating");
    assert!(b.ticks() >= later, "B stopped ticking at {}", b.ticks());
    assert_eq!(a.role(), LinkRole::Internal);
    assert_eq!(b.state(), ConnectionState::AwaitingLocalConfirm);
    assert_eq!(b.role(), LinkRole::Unconnected);
    Ok(())
}

/// With the default policy the same dead line just keeps both sides waiting.
#[tokio::test]
async fn test_dead_line_waits_forever_by_default() -> Result<()> {
    let (mut cable, mut a, mut b) = rig(
        lossy(22, 1.0),
        Side::new(b"ABC", ScriptedConfirm::at(0)),
        Side::new(b"XY", ScriptedConfirm::never()),
    )?;

    let both = async { tokio::join!(a.run(), b.run()) };
    let stalled = tokio::time::timeout(Duration::from_millis(200), both).await;

    assert!(stalled.is_err(), "nothing should complete on a dead line");
    assert_eq!(a.state(), ConnectionState::AwaitingRemote);
    assert_eq!(b.state(), ConnectionState::AwaitingLocalConfirm);
    assert!(cable.wait_for_boundary(10).await? >= 10);
    Ok(())
}

/// Clearing the fault mid-session lets the pending handshake complete.
#[tokio::test]
async fn test_recovers_when_line_clears() -> Result<()> {
    let (mut cable, mut a, mut b) = rig(
        lossy(23, 1.0),
        Side::new(b"ABC", ScriptedConfirm::at(0)),
        Side::new(b"XY", ScriptedConfirm::never()),
    )?;

    let clear = async {
        cable.wait_for_boundary(20).await?;
        cable.set_faults(SimFaults::default())?;
        Ok::<_, LinkError>(())
    };
    let (sessions, cleared) = tokio::join!(run_both(&mut a, &mut b), clear);
    cleared?;
    let (sa, sb) = sessions?;

    assert_eq!(sa.role, LinkRole::Internal);
    assert_eq!(sb.role, LinkRole::External);
    assert_eq!(&sa.peer_name[..], b"XY");
    assert_eq!(&sb.peer_name[..], b"AB");
    assert!(sa.ticks >= 20);
    Ok(())
}

/// A master with no cable partner reads the idle line and never links.
#[tokio::test]
async fn test_missing_peer_reports_link_lost() -> Result<()> {
    let (_cable, port_a, port_b) = Cable::spawn(seeded(24));
    drop(port_b);
    let name = NameBuffer::new(b"ABC")?;
    let mut a = LinkStateMachine::new(
        "A",
        port_a,
        ScriptedConfirm::at(0),
        TracingRender::new("A"),
        name,
    )
    .with_policy(WaitPolicy::Deadline(Duration::from_millis(50)));

    let err = a.run().await.unwrap_err();

    assert!(matches!(
        err,
        LinkError::LinkLost {
            state: ConnectionState::AwaitingRemote
        }
    ));
    Ok(())
}
