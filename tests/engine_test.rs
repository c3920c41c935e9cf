use modpatch::apply::{self, backup_path};
use modpatch::hex_pattern::{self, BytePattern};
use modpatch::patch_format::{from_raw, RawBlock, RawDefinition};
use modpatch::{catalog, matcher, plan, status, Direction, PatchDefinition, PatchStatus};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn definition(id: &str, blocks: &[(&str, &str)]) -> PatchDefinition {
    from_raw(
        RawDefinition {
            id: Some(id.to_string()),
            name: None,
            description: None,
            blocks: blocks
                .iter()
                .map(|(find, replace)| RawBlock {
                    find: find.to_string(),
                    replace: replace.to_string(),
                })
                .collect(),
        },
        Path::new("inline.json"),
    )
    .unwrap()
}

fn move_patch(def: &PatchDefinition, buf: &mut Vec<u8>, direction: Direction) {
    let ops = plan::plan(def, &buf[..], direction).unwrap();
    apply::apply_to_buffer(&mut buf[..], &ops).unwrap();
}

#[test]
fn test_plain_hex_reconstructs_bytes() {
    let bytes: Vec<u8> = (0..=255u8).collect();
    let hex: String = bytes.iter().map(|b| format!("{:02x} ", b)).collect();
    let pattern = hex_pattern::parse(&hex).unwrap();
    assert_eq!(pattern.bytes(), bytes.as_slice());
    assert!(!pattern.has_wildcards());
}

#[test]
fn test_exact_find_replace_round_trip() {
    let original: Vec<u8> = vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60];
    let find = BytePattern::exact(&[0x30, 0x40]).unwrap();
    let replace = BytePattern::exact(&[0xAA, 0xBB]).unwrap();

    let mut buf = original.clone();
    let at = matcher::find_first(&buf, &find, 0).unwrap().unwrap();
    buf[at..at + 2].copy_from_slice(replace.bytes());
    assert_eq!(buf, vec![0x10, 0x20, 0xAA, 0xBB, 0x50, 0x60]);

    let at = matcher::find_first(&buf, &replace, 0).unwrap().unwrap();
    buf[at..at + 2].copy_from_slice(find.bytes());
    assert_eq!(buf, original);
}

#[test]
fn test_wildcard_scenario() {
    let buf = [0xDE, 0xAD, 0x00, 0xEF, 0xDE, 0xAD, 0xFF, 0xEF];
    let pattern = hex_pattern::parse("DE AD ?? EF").unwrap();
    assert_eq!(matcher::find_first(&buf, &pattern, 0).unwrap(), Some(0));
    assert_eq!(
        matcher::find_all(&buf, &pattern).collect::<Vec<_>>(),
        vec![0, 4]
    );
}

#[test]
fn test_find_first_is_smallest_valid_alignment() {
    let buf: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
    for hex in ["00", "FF ??", "?? 10 ??", "7F 80"] {
        let pattern = hex_pattern::parse(hex).unwrap();
        let expected = (0..=buf.len() - pattern.len()).find(|&i| pattern.matches_at(&buf[i..]));
        let got = matcher::find_first(&buf, &pattern, 0).unwrap();
        assert_eq!(got, expected, "pattern {}", hex);
        if let Some(i) = got {
            assert!(pattern.matches_at(&buf[i..i + pattern.len()]));
        }
    }
}

#[test]
fn test_nop_jump_scenario() {
    let def = definition("nop_jump", &[("90 90", "EB 00")]);
    let original = vec![0x55, 0x8B, 0xEC, 0x90, 0x90, 0x5D, 0xC3];
    let mut buf = original.clone();

    assert_eq!(status::analyze(&def, &buf), PatchStatus::Found);

    move_patch(&def, &mut buf, Direction::Forward);
    assert_eq!(buf, vec![0x55, 0x8B, 0xEC, 0xEB, 0x00, 0x5D, 0xC3]);
    assert_eq!(status::analyze(&def, &buf), PatchStatus::Applied);

    move_patch(&def, &mut buf, Direction::Reverse);
    assert_eq!(buf, original);
    assert_eq!(status::analyze(&def, &buf), PatchStatus::Found);
}

#[test]
fn test_multi_block_apply_then_reverse_restores() {
    let def = definition(
        "multi",
        &[
            ("74 05 E8", "EB 05 E8"),
            ("00 00 70 42", "00 00 A0 42"),
            ("C7 45 FC 01", "C7 45 FC 00"),
        ],
    );
    let original = vec![
        0x74, 0x05, 0xE8, 0x11, 0x22, 0x00, 0x00, 0x70, 0x42, 0x33, 0xC7, 0x45, 0xFC, 0x01,
    ];
    let mut buf = original.clone();

    move_patch(&def, &mut buf, Direction::Forward);
    assert_ne!(buf, original);
    assert_eq!(status::analyze(&def, &buf), PatchStatus::Applied);

    move_patch(&def, &mut buf, Direction::Reverse);
    assert_eq!(buf, original);
}

#[test]
fn test_analyze_has_no_side_effects() {
    let def = definition("p", &[("90 90", "EB 00")]);
    let buf = vec![0x90, 0x90, 0x00];
    let snapshot = buf.clone();
    let first = status::analyze(&def, &buf);
    let second = status::analyze(&def, &buf);
    assert_eq!(first, second);
    assert_eq!(buf, snapshot);
}

#[test]
fn test_catalog_with_one_good_and_one_bad_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("good.json"),
        r#"{"id":"good","blocks":[{"find":"90 90","replace":"EB 00"}]}"#,
    )
    .unwrap();
    fs::write(
        temp.path().join("malformed.json"),
        r#"{"blocks":[{"find":"90 9","replace":"EB 00"}]}"#,
    )
    .unwrap();

    let defs = catalog::load_all(temp.path()).unwrap();
    assert_eq!(defs.len(), 2);

    let good = defs.iter().find(|d| d.id == "good").unwrap();
    let bad = defs.iter().find(|d| d.id == "malformed").unwrap();
    assert!(!bad.valid);
    assert_eq!(status::analyze(bad, &[0x90, 0x90]), PatchStatus::Invalid);

    let mut buf = vec![0x90, 0x90];
    move_patch(good, &mut buf, Direction::Forward);
    assert_eq!(buf, vec![0xEB, 0x00]);
}

#[test]
fn test_file_patch_cycle_keeps_first_backup() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("game.exe");
    let original = vec![0x00, 0x90, 0x90, 0x00];
    fs::write(&target, &original).unwrap();

    let def = definition("p", &[("90 90", "EB 00")]);

    for _ in 0..3 {
        let bytes = fs::read(&target).unwrap();
        let ops = plan::plan(&def, &bytes, Direction::Forward).unwrap();
        apply::apply_to_file(&target, &ops, true).unwrap();

        let bytes = fs::read(&target).unwrap();
        assert_eq!(status::analyze(&def, &bytes), PatchStatus::Applied);
        let ops = plan::plan(&def, &bytes, Direction::Reverse).unwrap();
        apply::apply_to_file(&target, &ops, true).unwrap();

        assert_eq!(fs::read(backup_path(&target)).unwrap(), original);
    }
    assert_eq!(fs::read(&target).unwrap(), original);
}
