mod common;

use common::*;
use steghider::manifest::{sha256_hex, PLAIN_MANIFEST_FILE, SEALED_MANIFEST_FILE};
use steghider::{
    chunk_and_embed, reassemble, reassemble_files, reassemble_named, ChunkOptions, Manifest,
    ParityPolicy,
};

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

#[test]
fn test_reassembly_is_order_independent() -> Result<(), StegoError> {
    init_tracing();
    let data = noise(3000, 11);
    let set = chunk_and_embed(&data, "report.bin", &covers(3, 64), &ChunkOptions::new())?;
    assert_eq!(set.chunks.len(), 3);
    let images = set.images();

    for order in PERMUTATIONS {
        let shuffled: Vec<CoverImage> = order.iter().map(|&i| images[i].clone()).collect();
        let recovered = reassemble(&shuffled, &Credentials::new())?;
        assert_eq!(recovered, data, "order {order:?}");
    }
    Ok(())
}

#[test]
fn test_chunked_round_trip_per_level() -> Result<(), StegoError> {
    init_tracing();
    let data = noise(2500, 3);
    for level in [SecurityLevel::Basic, SecurityLevel::Advanced, SecurityLevel::Premium] {
        let creds = credentials_for(level);
        let options = ChunkOptions::new().with_level(level).with_credentials(creds.clone());
        let set = chunk_and_embed(&data, "payload.dat", &covers(4, 64), &options)?;
        assert_eq!(set.level(), level);

        let recovered = reassemble_named(&set.images(), &creds)?;
        assert_eq!(recovered.original_name, "payload.dat");
        assert_eq!(recovered.data, data, "level {level}");
    }
    Ok(())
}

#[test]
fn test_manifest_describes_chunks() -> Result<(), StegoError> {
    let data = noise(3000, 5);
    let set = chunk_and_embed(&data, "report.bin", &covers(3, 64), &ChunkOptions::new())?;
    let manifest = &set.manifest;

    assert_eq!(manifest.original_filename, "report.bin");
    assert_eq!(manifest.total_size, 3000);
    assert_eq!(manifest.total_chunks, set.chunks.len());
    assert!(manifest.created_at.is_some());
    for (entry, chunk) in manifest.chunks.iter().zip(&set.chunks) {
        assert_eq!(entry.index, chunk.index);
        assert_eq!(entry.cover, chunk.name);
        assert_eq!(entry.nsym, chunk.nsym);
        assert_eq!(entry.sha256.len(), 64);
    }
    let total: usize = manifest.chunks.iter().map(|c| c.chunk_len).sum();
    assert!(total >= 3000);
    Ok(())
}

#[test]
fn test_write_to_dir_and_reassemble_files() -> Result<(), StegoError> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let data = noise(2800, 9);

    let set = chunk_and_embed(&data, "notes.bin", &covers(3, 64), &ChunkOptions::new())?;
    let mut paths = set.write_to_dir(dir.path())?;
    assert!(dir.path().join(PLAIN_MANIFEST_FILE).exists());
    assert!(paths[0].ends_with("chunk_000.png"));

    paths.reverse();
    let recovered = reassemble_files(&paths, &Credentials::new())?;
    assert_eq!(sha256_hex(&recovered), sha256_hex(&data));

    let manifest = Manifest::read_from_dir(dir.path(), &Credentials::new())?;
    assert_eq!(manifest, set.manifest);
    Ok(())
}

#[test]
fn test_encrypted_payload_seals_manifest() -> Result<(), StegoError> {
    let dir = tempfile::tempdir()?;
    let creds = credentials_for(SecurityLevel::Advanced);
    let options = ChunkOptions::new()
        .with_level(SecurityLevel::Advanced)
        .with_credentials(creds.clone());

    let set = chunk_and_embed(&noise(1000, 2), "s.bin", &covers(2, 64), &options)?;
    set.write_to_dir(dir.path())?;
    assert!(dir.path().join(SEALED_MANIFEST_FILE).exists());
    assert!(!dir.path().join(PLAIN_MANIFEST_FILE).exists());

    let raw = std::fs::read(dir.path().join(SEALED_MANIFEST_FILE))?;
    assert!(serde_json::from_slice::<serde_json::Value>(&raw).is_err());
    assert_eq!(Manifest::read_from_dir(dir.path(), &creds)?, set.manifest);
    Ok(())
}

#[test]
fn test_insufficient_capacity_leaves_nothing_embedded() {
    let data = noise(8000, 4);
    let result = chunk_and_embed(&data, "big.bin", &covers(2, 64), &ChunkOptions::new());
    assert!(matches!(result, Err(StegoError::InsufficientCapacity { .. })));
}

#[test]
fn test_foreign_chunk_rejected() -> Result<(), StegoError> {
    let first = chunk_and_embed(&noise(2000, 1), "a.bin", &covers(2, 64), &ChunkOptions::new())?;
    let second = chunk_and_embed(&noise(2400, 2), "b.bin", &covers(2, 64), &ChunkOptions::new())?;

    let mixed = vec![first.chunks[0].image.clone(), second.chunks[1].image.clone()];
    let err = reassemble(&mixed, &Credentials::new()).unwrap_err();
    assert!(matches!(err, StegoError::AssemblyFailed { .. }), "{err}");
    Ok(())
}

#[test]
fn test_no_parity_chunks_still_reassemble() -> Result<(), StegoError> {
    let data = noise(1500, 8);
    let options = ChunkOptions::new().with_parity(ParityPolicy::None);
    let set = chunk_and_embed(&data, "raw.bin", &covers(2, 64), &options)?;
    assert!(set.chunks.iter().all(|chunk| chunk.nsym == 0));
    assert_eq!(reassemble(&set.images(), &Credentials::new())?, data);
    Ok(())
}
