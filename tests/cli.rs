//! Command-line tests running the built binary against PKCS#12 identities.

mod common;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use base64::Engine as _;
use openssl::pkcs12::Pkcs12;
use tempfile::TempDir;

use certstore_signer::{HashAlgorithm, MethodResponse, ResponseValue};

use common::{rsa_key, self_signed, verify_rsa, PAYLOAD};

const PAYLOAD_SHA256: &str = "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3";

struct Fixture {
    dir: TempDir,
    cert: openssl::x509::X509,
}

impl Fixture {
    fn new(common_name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let key = rsa_key();
        let cert = self_signed(common_name, &key);
        let mut builder = Pkcs12::builder();
        builder.name(common_name).pkey(&key).cert(&cert);
        let der = builder.build2("").unwrap().to_der().unwrap();
        std::fs::write(dir.path().join("identity.p12"), der).unwrap();
        std::fs::write(dir.path().join("payload.bin"), PAYLOAD).unwrap();
        Self { dir, cert }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Command with an isolated config file and the fixture's PKCS#12 store.
    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_certstore-signer"));
        cmd.arg(subcommand)
            .arg("--pkcs12")
            .arg(self.path("identity.p12"))
            .arg("--config")
            .arg(self.path("config.toml"))
            .env("CERTSTORE_PKCS12_PASSWORD", "")
            .env("RUST_LOG", "error");
        cmd
    }
}

fn run(cmd: &mut Command) -> Output {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

mod store_commands {
    use super::*;

    #[test]
    fn test_select_prints_pem() {
        let fixture = Fixture::new("Cli Select");
        let output = run(&mut fixture.command("select"));
        let pem = stdout(&output);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
    }

    #[test]
    fn test_subject_prints_common_name() {
        let fixture = Fixture::new("Cli Subject");
        let output = run(&mut fixture.command("subject"));
        assert_eq!(stdout(&output).trim(), "Cli Subject");
    }

    #[test]
    fn test_sign_writes_raw_signature() {
        let fixture = Fixture::new("Cli Sign");
        let sig_path = fixture.path("payload.sig");
        run(fixture
            .command("sign")
            .arg("--input")
            .arg(fixture.path("payload.bin"))
            .arg("--output")
            .arg(&sig_path)
            .arg("--algorithm")
            .arg("sha-384"));

        let signature = std::fs::read(&sig_path).unwrap();
        assert!(verify_rsa(&fixture.cert, HashAlgorithm::Sha384, PAYLOAD, &signature));
    }

    #[test]
    fn test_sign_prints_base64_by_default() {
        let fixture = Fixture::new("Cli Base64");
        let output = run(fixture
            .command("sign")
            .arg("--input")
            .arg(fixture.path("payload.bin")));

        let signature = base64::engine::general_purpose::STANDARD
            .decode(stdout(&output).trim())
            .unwrap();
        assert!(verify_rsa(&fixture.cert, HashAlgorithm::Sha256, PAYLOAD, &signature));
    }

    #[test]
    fn test_strict_flag_rejects_unknown_algorithm() {
        let fixture = Fixture::new("Cli Strict");
        let output = fixture
            .command("sign")
            .arg("--input")
            .arg(fixture.path("payload.bin"))
            .arg("--algorithm")
            .arg("md5")
            .arg("--strict")
            .output()
            .unwrap();
        assert!(!output.status.success());
    }

    #[test]
    fn test_missing_pkcs12_file_fails() {
        let fixture = Fixture::new("Cli Missing");
        std::fs::remove_file(fixture.path("identity.p12")).unwrap();
        let output = fixture.command("select").output().unwrap();
        assert!(!output.status.success());
    }
}

mod serve_command {
    use super::*;

    #[test]
    fn test_serve_answers_json_lines() {
        let fixture = Fixture::new("Cli Serve");
        let mut child = fixture
            .command("serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        {
            let mut stdin = child.stdin.take().unwrap();
            let sign = serde_json::json!({
                "method": "signData",
                "arguments": { "algorithm": "sha-512", "data": PAYLOAD },
            });
            writeln!(stdin, r#"{{"method":"selectCertificate"}}"#).unwrap();
            writeln!(stdin, r#"{{"method":"certificateSubject"}}"#).unwrap();
            writeln!(stdin, "{sign}").unwrap();
            writeln!(stdin, r#"{{"method":"listCertificates"}}"#).unwrap();
            writeln!(stdin, "not json").unwrap();
        }

        let output = child.wait_with_output().unwrap();
        assert!(output.status.success());
        let responses: Vec<MethodResponse> = stdout(&output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 5);

        assert!(matches!(
            &responses[0],
            MethodResponse::Success { value: ResponseValue::Text(pem) }
                if pem.starts_with("-----BEGIN CERTIFICATE-----")
        ));
        assert_eq!(
            responses[1],
            MethodResponse::Success {
                value: ResponseValue::Text("Cli Serve".to_string())
            }
        );
        match &responses[2] {
            MethodResponse::Success {
                value: ResponseValue::Bytes(signature),
            } => assert!(verify_rsa(
                &fixture.cert,
                HashAlgorithm::Sha512,
                PAYLOAD,
                signature
            )),
            other => panic!("unexpected response {other:?}"),
        }
        assert_eq!(responses[3], MethodResponse::NotImplemented);
        assert!(matches!(
            &responses[4],
            MethodResponse::Error { code, .. } if code == "signing_error"
        ));
    }
}

mod offline_commands {
    use super::*;

    #[test]
    fn test_digest_prints_hex() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("payload.bin");
        std::fs::write(&input, PAYLOAD).unwrap();

        let output = run(Command::new(env!("CARGO_BIN_EXE_certstore-signer"))
            .arg("digest")
            .arg("--input")
            .arg(&input)
            .arg("--algorithm")
            .arg("sha-256"));
        assert_eq!(stdout(&output).trim(), PAYLOAD_SHA256);
    }

    #[test]
    fn test_digest_unknown_algorithm_hashes_with_sha256() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("payload.bin");
        std::fs::write(&input, PAYLOAD).unwrap();

        for name in ["md5", ""] {
            let output = run(Command::new(env!("CARGO_BIN_EXE_certstore-signer"))
                .arg("digest")
                .arg("--input")
                .arg(&input)
                .arg("--algorithm")
                .arg(name));
            assert_eq!(stdout(&output).trim(), PAYLOAD_SHA256, "{name:?}");
        }
    }

    #[test]
    fn test_digest_strict_rejects_unknown_algorithm() {
        let output = Command::new(env!("CARGO_BIN_EXE_certstore-signer"))
            .arg("digest")
            .arg("--input")
            .arg(Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"))
            .arg("--algorithm")
            .arg("md5")
            .arg("--strict")
            .output()
            .unwrap();
        assert!(!output.status.success());
    }
}

mod logging {
    use super::*;

    fn stderr(output: &Output) -> String {
        String::from_utf8_lossy(&output.stderr).into_owned()
    }

    #[test]
    fn test_info_is_default_level() {
        let fixture = Fixture::new("Cli Quiet");
        let output = run(fixture.command("subject").env_remove("RUST_LOG"));
        assert!(!stderr(&output).contains("Connected to"));
    }

    #[test]
    fn test_verbose_flag_enables_debug() {
        let fixture = Fixture::new("Cli Verbose");
        let output = run(fixture
            .command("subject")
            .arg("--verbose")
            .env_remove("RUST_LOG"));
        assert!(stderr(&output).contains("Connected to"));
    }

    #[test]
    fn test_verbose_config_enables_debug() {
        let fixture = Fixture::new("Cli Verbose Config");
        std::fs::write(fixture.path("config.toml"), "verbose = true\n").unwrap();
        let output = run(fixture.command("subject").env_remove("RUST_LOG"));
        assert!(stderr(&output).contains("Connected to"));
    }
}
