//! [`DecryptionPipeline`]: the file, text and upload flows over one storage layout.

use std::io::ErrorKind;
use std::path::Path;

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};
use bytes::Bytes;
use common::protocol::KeyMaterial;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{keys, PipelineError};
use crate::config::StorageLayout;
use crate::crypto;
use crate::keystore::{
    discard_staged, staging_path, validate_file_name, KeyMaterialStore, StoreError,
};

/// Standard alphabet, padding optional: browsers and Node emit both forms.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode standard or URL-safe base64, ignoring ASCII whitespace anywhere in
/// the input.
fn decode_base64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    BASE64.decode(normalized)
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, PipelineError> {
    decode_base64(value).map_err(|source| PipelineError::InvalidEncoding { field, source })
}

/// Decode a stored record. Bad base64 here is server-side corruption, not a
/// caller error.
fn decode_record(
    file_name: &str,
    material: &KeyMaterial,
) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
    let corrupt = |source: base64::DecodeError| StoreError::CorruptRecord {
        file_name: file_name.to_owned(),
        source: source.into(),
    };
    let wrapped_key = decode_base64(&material.key).map_err(corrupt)?;
    let iv = decode_base64(&material.iv).map_err(corrupt)?;
    Ok((wrapped_key, iv))
}

/// Stateless orchestrator over a fixed [`StorageLayout`].
///
/// Cheap to clone; holds no per-request state, so concurrent calls with
/// different inputs are independent.
#[derive(Clone, Debug)]
pub struct DecryptionPipeline {
    layout: StorageLayout,
    store: KeyMaterialStore,
}

impl DecryptionPipeline {
    /// Create a pipeline reading keys and files from `layout`.
    pub fn new(layout: StorageLayout) -> Self {
        let store = KeyMaterialStore::new(layout.clone());
        Self { layout, store }
    }

    /// The storage layout this pipeline operates on.
    #[cfg(test)]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Base64 body of the server public key.
    pub async fn public_key(&self) -> Result<String, PipelineError> {
        keys::load_public_key(&self.layout).await
    }

    /// Store an uploaded encrypted file under `file_name` together with its
    /// key material. Both are overwritten if they already exist.
    ///
    /// The ciphertext is staged first and renamed into place only after the
    /// record is saved, so a failed upload leaves the previous pair intact.
    /// It is not inspected here; malformed uploads fail at decryption time.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), file_name = %file_name, size = contents.len()))]
    pub async fn upload(
        &self,
        file_name: &str,
        contents: Bytes,
        material: &KeyMaterial,
    ) -> Result<(), PipelineError> {
        validate_file_name(file_name)?;
        let path = self.layout.upload_path(file_name);
        let staging = staging_path(&path);
        if let Err(source) = tokio::fs::write(&staging, &contents).await {
            discard_staged(&staging).await;
            return Err(io_error(&staging, source));
        }
        if let Err(e) = self.store.save(file_name, material).await {
            discard_staged(&staging).await;
            return Err(e.into());
        }
        if let Err(source) = tokio::fs::rename(&staging, &path).await {
            discard_staged(&staging).await;
            return Err(io_error(&path, source));
        }
        info!("upload stored");
        Ok(())
    }

    /// Decrypt a previously uploaded file into `decrypted-<file_name>`.
    ///
    /// Steps: private key → key material → encrypted bytes → base64 decode →
    /// hybrid decrypt → write. The write is last, so a failure in any earlier
    /// step leaves no output behind. An existing output file is overwritten.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), file_name = %file_name))]
    pub async fn decrypt_file(&self, file_name: &str) -> Result<(), PipelineError> {
        validate_file_name(file_name)?;
        let private_key = keys::load_private_key(&self.layout).await?;
        let material = self.store.load(file_name).await?;

        let upload_path = self.layout.upload_path(file_name);
        let ciphertext = tokio::fs::read(&upload_path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                PipelineError::UploadNotFound(file_name.to_owned())
            } else {
                io_error(&upload_path, source)
            }
        })?;

        let (wrapped_key, iv) = decode_record(file_name, &material)?;
        let plaintext = crypto::decrypt(&wrapped_key, &iv, &ciphertext, &private_key)?;

        let output_path = self.layout.decrypted_path(file_name);
        tokio::fs::write(&output_path, &plaintext)
            .await
            .map_err(|source| io_error(&output_path, source))?;

        info!(bytes = plaintext.len(), "file decrypted");
        Ok(())
    }

    /// Decrypt a base64 message with a base64 wrapped key and IV and return
    /// the plaintext as UTF-8. Invalid sequences become U+FFFD. Nothing is
    /// written to disk.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
    pub async fn decrypt_text(
        &self,
        message: &str,
        wrapped_key_b64: &str,
        iv_b64: &str,
    ) -> Result<String, PipelineError> {
        let private_key = keys::load_private_key(&self.layout).await?;

        let wrapped_key = decode_field("key", wrapped_key_b64)?;
        let iv = decode_field("iv", iv_b64)?;
        let ciphertext = decode_field("message", message)?;
        let plaintext = crypto::decrypt(&wrapped_key, &iv, &ciphertext, &private_key)?;

        info!(bytes = plaintext.len(), "text decrypted");
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;
    use crate::test_support;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn pipeline(dir: &tempfile::TempDir) -> DecryptionPipeline {
        DecryptionPipeline::new(test_support::storage(dir.path()))
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"hello world", 32);

        pipeline
            .upload("doc.txt", Bytes::from(sealed.payload.clone()), &sealed.key_material())
            .await
            .unwrap();
        pipeline.decrypt_file("doc.txt").await.unwrap();

        let output = std::fs::read(dir.path().join("files/decrypted-doc.txt")).unwrap();
        assert_eq!(output, b"hello world");
    }

    #[tokio::test]
    async fn file_round_trip_via_store_and_raw_write() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"hello world", 16);

        KeyMaterialStore::new(pipeline.layout().clone())
            .save("doc.txt", &sealed.key_material())
            .await
            .unwrap();
        std::fs::write(dir.path().join("files/doc.txt"), &sealed.payload).unwrap();

        pipeline.decrypt_file("doc.txt").await.unwrap();
        let output = std::fs::read_to_string(dir.path().join("files/decrypted-doc.txt")).unwrap();
        assert_eq!(output, "hello world");
    }

    #[tokio::test]
    async fn redecrypting_overwrites_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let output = dir.path().join("files/decrypted-doc.txt");
        std::fs::write(&output, b"stale").unwrap();

        let sealed = test_support::seal(b"fresh", 32);
        pipeline
            .upload("doc.txt", Bytes::from(sealed.payload.clone()), &sealed.key_material())
            .await
            .unwrap();
        pipeline.decrypt_file("doc.txt").await.unwrap();
        pipeline.decrypt_file("doc.txt").await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn missing_record_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        std::fs::write(dir.path().join("files/doc.txt"), [0u8; 32]).unwrap();

        let err = pipeline.decrypt_file("doc.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::RecordNotFound(_))));
        assert!(!dir.path().join("files/decrypted-doc.txt").exists());
    }

    #[tokio::test]
    async fn missing_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"x", 32);
        KeyMaterialStore::new(pipeline.layout().clone())
            .save("gone.bin", &sealed.key_material())
            .await
            .unwrap();

        assert!(matches!(
            pipeline.decrypt_file("gone.bin").await,
            Err(PipelineError::UploadNotFound(name)) if name == "gone.bin"
        ));
    }

    #[tokio::test]
    async fn truncated_upload_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"some file contents", 32);
        let truncated = Bytes::copy_from_slice(&sealed.payload[..sealed.payload.len() - 3]);
        pipeline
            .upload("doc.txt", truncated, &sealed.key_material())
            .await
            .unwrap();

        assert!(matches!(
            pipeline.decrypt_file("doc.txt").await,
            Err(PipelineError::Crypto(CryptoError::PayloadDecryptFailure))
        ));
        assert!(!dir.path().join("files/decrypted-doc.txt").exists());
    }

    #[tokio::test]
    async fn missing_private_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        std::fs::remove_file(&pipeline.layout().private_key_path).unwrap();
        let sealed = test_support::seal(b"secret", 32);
        let material = sealed.key_material();

        let err = pipeline
            .decrypt_text(&sealed.payload_b64(), &material.key, &material.iv)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn text_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"secret", 32);
        let material = sealed.key_material();

        let plaintext = pipeline
            .decrypt_text(&sealed.payload_b64(), &material.key, &material.iv)
            .await
            .unwrap();
        assert_eq!(plaintext, "secret");
    }

    #[tokio::test]
    async fn text_accepts_unpadded_base64() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal("ünïcödé".as_bytes(), 24);
        let material = sealed.key_material();

        let plaintext = pipeline
            .decrypt_text(
                sealed.payload_b64().trim_end_matches('='),
                material.key.trim_end_matches('='),
                material.iv.trim_end_matches('='),
            )
            .await
            .unwrap();
        assert_eq!(plaintext, "ünïcödé");
    }

    #[tokio::test]
    async fn text_rejects_bad_base64() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"secret", 32);
        let material = sealed.key_material();

        assert!(matches!(
            pipeline.decrypt_text("***", &material.key, &material.iv).await,
            Err(PipelineError::InvalidEncoding { field: "message", .. })
        ));
        assert!(matches!(
            pipeline.decrypt_text(&sealed.payload_b64(), &material.key, "%%").await,
            Err(PipelineError::InvalidEncoding { field: "iv", .. })
        ));
    }

    #[tokio::test]
    async fn text_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"caf\xe9 ok", 32);
        let material = sealed.key_material();

        let plaintext = pipeline
            .decrypt_text(&sealed.payload_b64(), &material.key, &material.iv)
            .await
            .unwrap();
        assert_eq!(plaintext, "caf\u{FFFD} ok");
    }

    #[tokio::test]
    async fn text_accepts_url_safe_and_wrapped_base64() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"secret", 32);
        let url_safe = |bytes: &[u8]| URL_SAFE_NO_PAD.encode(bytes);

        let key = url_safe(&sealed.wrapped_key);
        let wrapped_key = format!("{}\n{}", &key[..40], &key[40..]);
        let plaintext = pipeline
            .decrypt_text(&url_safe(&sealed.payload), &wrapped_key, &url_safe(&sealed.iv))
            .await
            .unwrap();
        assert_eq!(plaintext, "secret");
    }

    #[tokio::test]
    async fn file_with_url_safe_record_decrypts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"hello world", 32);
        let material = KeyMaterial {
            key: URL_SAFE_NO_PAD.encode(&sealed.wrapped_key),
            iv: URL_SAFE_NO_PAD.encode(&sealed.iv),
        };

        pipeline
            .upload("doc.txt", Bytes::from(sealed.payload.clone()), &material)
            .await
            .unwrap();
        pipeline.decrypt_file("doc.txt").await.unwrap();
        let output = std::fs::read(dir.path().join("files/decrypted-doc.txt")).unwrap();
        assert_eq!(output, b"hello world");
    }

    #[tokio::test]
    async fn undecodable_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"hello world", 32);
        let material = KeyMaterial {
            key: "***".into(),
            iv: sealed.key_material().iv,
        };
        pipeline
            .upload("doc.txt", Bytes::from(sealed.payload.clone()), &material)
            .await
            .unwrap();

        let err = pipeline.decrypt_file("doc.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::CorruptRecord { .. })));
        assert_eq!(common::ServiceError::from(err).http_status(), 500);
        assert!(!dir.path().join("files/decrypted-doc.txt").exists());
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let old = test_support::seal(b"old contents", 32);
        pipeline
            .upload("doc.txt", Bytes::from(old.payload.clone()), &old.key_material())
            .await
            .unwrap();

        let record = pipeline.layout().key_material_path("doc.txt");
        std::fs::remove_file(&record).unwrap();
        std::fs::create_dir(&record).unwrap();
        std::fs::write(record.join("keep"), b"x").unwrap();

        let new = test_support::seal(b"new contents", 32);
        assert!(pipeline
            .upload("doc.txt", Bytes::from(new.payload.clone()), &new.key_material())
            .await
            .is_err());

        let upload = std::fs::read(pipeline.layout().upload_path("doc.txt")).unwrap();
        assert_eq!(upload, old.payload);
        let leftovers = std::fs::read_dir(dir.path().join("files"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn text_with_foreign_wrapped_key_fails_unwrap() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"secret", 32);
        let material = sealed.key_material();
        let bogus_key = BASE64.encode([0x42u8; 128]);

        assert!(matches!(
            pipeline
                .decrypt_text(&sealed.payload_b64(), &bogus_key, &material.iv)
                .await,
            Err(PipelineError::Crypto(CryptoError::KeyUnwrapFailure))
        ));
    }

    #[tokio::test]
    async fn upload_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let sealed = test_support::seal(b"x", 32);
        assert!(matches!(
            pipeline
                .upload("../keys/pkcs8.key", Bytes::from_static(b"pwned"), &sealed.key_material())
                .await,
            Err(PipelineError::Store(StoreError::InvalidFileName(_)))
        ));
        assert_eq!(
            std::fs::read_to_string(&pipeline.layout().private_key_path).unwrap(),
            test_support::private_pem()
        );
    }

    #[tokio::test]
    async fn public_key_matches_file_body() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let body = pipeline.public_key().await.unwrap();
        let decoded = BASE64.decode(&body).unwrap();
        assert!(crate::crypto::RsaEncryptionKey::from_spki_der(&decoded).is_ok());
    }
}
