use crate::*;

use tether_core::{LinkRole, TetherConfig};
use tether_link::{ConnectionState, LinkError};

fn parse(text: &str) -> Result<TetherConfig> {
    toml::from_str(text).context("config should parse")
}

/// A config file drives the whole demo setup: names, confirm ticks, pacing.
#[tokio::test]
async fn test_session_from_config() -> Result<()> {
    let config = parse(
        r#"
[link]
tick_hz = 2000.0
paced = true

[sim]
seed = 42

[demo]
name_a = "RED"
name_b = "BLUE"
confirm_a_tick = -1
confirm_b_tick = 3
"#,
    )?;
    let cable = CableConfig::from_config(&config);
    assert!(cable.tick_period.is_some());
    assert_eq!(cable.seed, Some(42));

    let policy = WaitPolicy::from_timeout(config.link.wait_timeout());
    let confirm_a = ScriptedConfirm::from_tick(config.demo.confirm_a());
    let confirm_b = ScriptedConfirm::from_tick(config.demo.confirm_b());
    let (_cable, mut a, mut b) = rig(
        cable,
        Side::new(config.demo.name_a.as_bytes(), confirm_a).with_policy(policy),
        Side::new(config.demo.name_b.as_bytes(), confirm_b).with_policy(policy),
    )?;

    let (sa, sb) = run_both(&mut a, &mut b).await?;

    assert_eq!(sa.role, LinkRole::External);
    assert_eq!(sb.role, LinkRole::Internal);
    assert_eq!(&sa.peer_name[..], b"BLU");
    assert_eq!(&sb.peer_name[..], b"RED");
    Ok(())
}

/// `wait_timeout_ms` and `drop_rate` together reproduce a lost link.
#[tokio::test]
async fn test_config_timeout_and_drops() -> Result<()> {
    let config = parse(
        r#"
[link]
paced = false
wait_timeout_ms = 80

[sim]
drop_rate = 1.0
seed = 5
"#,
    )?;
    let policy = WaitPolicy::from_timeout(config.link.wait_timeout());
    assert_eq!(policy, WaitPolicy::Deadline(Duration::from_millis(80)));

    let (_cable, mut a, mut b) = rig(
        CableConfig::from_config(&config),
        Side::new(b"ABC", ScriptedConfirm::at(0)).with_policy(policy),
        Side::new(b"XY", ScriptedConfirm::never()).with_policy(policy),
    )?;

    let watch_b = tokio::time::timeout(Duration::from_millis(300), b.run());
    let (ra, rb) = tokio::join!(a.run(), watch_b);

    assert_eq!(
        ra.unwrap_err(),
        LinkError::LinkLost {
            state: ConnectionState::AwaitingRemote
        }
    );
    assert!(rb.is_err());
    Ok(())
}

/// Out-of-range values from the file are tamed before they reach the cable.
#[test]
fn test_config_values_are_sanitized() -> Result<()> {
    let config = parse("[link]\ntick_hz = 0.0\npaced = true\n[sim]\ndrop_rate = 7.5\n")?;
    let cable = CableConfig::from_config(&config);

    assert_eq!(cable.faults.drop_rate, 1.0);
    assert_eq!(cable.seed, None);
    let period = cable.tick_period.context("paced cable has a period")?;
    assert!(period > Duration::from_millis(16) && period < Duration::from_millis(17));
    Ok(())
}
