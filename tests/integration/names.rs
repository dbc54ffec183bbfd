use crate::*;

use tether_core::wire::NAME_CAPACITY;

fn name_of(len: usize, base: u8) -> Vec<u8> {
    (0..len).map(|i| base.wrapping_add(i as u8)).collect()
}

/// Both records hold exactly `min(la, lb)` bytes, for every pair of lengths.
#[tokio::test]
async fn test_record_length_is_min_of_both() -> Result<()> {
    for la in [0, 1, 3, 7, NAME_CAPACITY] {
        for lb in [0, 2, 5, NAME_CAPACITY] {
            let name_a = name_of(la, 0x10);
            let name_b = name_of(lb, 0x80);
            let (_cable, mut a, mut b) = rig(
                seeded((la * 31 + lb) as u64),
                Side::new(&name_a, ScriptedConfirm::at(1)),
                Side::new(&name_b, ScriptedConfirm::never()),
            )?;

            let (sa, sb) = run_both(&mut a, &mut b).await?;

            let n = la.min(lb);
            assert_eq!(sa.peer_name.len(), n, "la={la} lb={lb}");
            assert_eq!(sb.peer_name.len(), n, "la={la} lb={lb}");
            assert_eq!(&sa.peer_name[..], &name_b[..n]);
            assert_eq!(&sb.peer_name[..], &name_a[..n]);
            assert_eq!(usize::from(sa.peer_declared), lb);
            assert_eq!(usize::from(sb.peer_declared), la);
        }
    }
    Ok(())
}

/// An empty name still completes; neither side receives payload.
#[tokio::test]
async fn test_empty_name_completes() -> Result<()> {
    let (_cable, mut a, mut b) = rig(
        seeded(11),
        Side::new(b"", ScriptedConfirm::never()),
        Side::new(b"MEW", ScriptedConfirm::at(0)),
    )?;

    let (sa, sb) = run_both(&mut a, &mut b).await?;

    assert!(sa.peer_name.is_empty());
    assert!(sb.peer_name.is_empty());
    assert_eq!(sa.peer_declared, 3);
    assert_eq!(sb.peer_declared, 0);
    Ok(())
}

/// Arbitrary byte values survive the line untouched, including the idle
/// pattern and the role bytes.
#[tokio::test]
async fn test_payload_bytes_are_opaque() -> Result<()> {
    let tricky = [0xFF, 0x00, 0x01, 0x02, 0x80, 0xFF];
    let (_cable, mut a, mut b) = rig(
        seeded(12),
        Side::new(&tricky, ScriptedConfirm::at(0)),
        Side::new(&tricky, ScriptedConfirm::never()),
    )?;

    let (sa, sb) = run_both(&mut a, &mut b).await?;

    assert_eq!(&sa.peer_name[..], &tricky);
    assert_eq!(&sb.peer_name[..], &tricky);
    Ok(())
}
