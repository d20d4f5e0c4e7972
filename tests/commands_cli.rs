use std::fs;
use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

const DEVICE_KEY: &str = "035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A";

#[derive(Debug, Default)]
struct FakeTerminalClient;

impl tapin::TerminalClient for FakeTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        false
    }

    fn stderr_is_terminal(&self) -> bool {
        false
    }
}

async fn run_with_parsed_args(args: tapin::Args) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let format = args.output_format().unwrap_or(tapin::OutputFormat::Pretty);
    let log_level = args.log_level();
    tapin::run_with_clients(
        args.into_command(),
        &mut output,
        &FakeTerminalClient,
        format,
        log_level,
    )
    .await?;
    Ok(String::from_utf8(output)?)
}

async fn run_with_argv<const N: usize>(argv: [&str; N]) -> anyhow::Result<String> {
    let parsed_args = tapin::Args::try_parse_from(argv)?;
    run_with_parsed_args(parsed_args).await
}

fn scratch_dir(name: &str) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("tapin-cli-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[tokio::test]
async fn encode_command_prints_frame_breakdown() -> anyhow::Result<()> {
    let stdout = run_with_argv(["tapin", "encode", "power-off"]).await?;
    assert!(stdout.contains("power-off"));
    assert!(stdout.contains("Request lens power off"));
    assert!(stdout.contains("0F 01 01 00 01 00 F9 1E 2C F0"));

    Ok(())
}

#[tokio::test]
async fn encode_command_emits_json_when_requested() -> anyhow::Result<()> {
    let stdout = run_with_argv([
        "tapin",
        "--format",
        "json",
        "encode",
        "status",
        "--target",
        "lens",
    ])
    .await?;
    let value: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!("lens-status", value["command"]);
    assert_eq!("0f0100000100fa2cb6f0", value["frame"]["raw"]);

    Ok(())
}

#[tokio::test]
async fn encode_set_settings_accepts_negative_focus_values() -> anyhow::Result<()> {
    let stdout = run_with_argv([
        "tapin",
        "--format",
        "json",
        "encode",
        "set-settings",
        "--ftm",
        "-1",
        "--vc-mode",
        "2",
        "--focus",
        "short:0=-10",
    ])
    .await?;
    let value: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!("set-settings", value["command"]);
    let raw = value["frame"]["raw"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("raw frame should be a string"))?;
    // Payload starts at frame byte 6; the short focus column starts 12 bytes in.
    assert_eq!("fb0002", &raw[12..18]);
    assert_eq!("f6", &raw[36..38]);

    Ok(())
}

#[tokio::test]
async fn decode_command_renders_capture() -> anyhow::Result<()> {
    let stdout = run_with_argv([
        "tapin",
        "decode",
        "0F 02 01 00 02 00 F7",
        "01 9E 8B F0",
    ])
    .await?;
    assert_snapshot!(stdout.trim_end(), @r"
    Messages:
    ╭────┬─────────┬──────────────────┬───────────────┬──────────┬───────╮
    │ id │ from    │ opcode           │ message       │ next     │ bytes │
    ├────┼─────────┼──────────────────┼───────────────┼──────────┼───────┤
    │ 0  │ console │ IS_LENS_ATTACHED │ Lens attached │ power-on │ 11    │
    ╰────┴─────────┴──────────────────┴───────────────┴──────────┴───────╯

    Adapter:
    ╭────────────────────┬───────╮
    │ field              │ value │
    ├────────────────────┼───────┤
    │ connected          │ true  │
    │ lens_attached      │ true  │
    │ mount              │ -     │
    │ firmware_version   │ -     │
    │ hardware_version   │ -     │
    │ connection_version │ -     │
    ╰────────────────────┴───────╯
    ");

    Ok(())
}

#[tokio::test]
async fn decode_command_rejects_odd_hex() {
    let error = run_with_argv(["tapin", "decode", "0F0"])
        .await
        .expect_err("odd hex length should fail");
    assert!(error.to_string().contains("hex"));
}

#[tokio::test]
async fn decrypt_command_writes_plain_image() -> anyhow::Result<()> {
    let dir = scratch_dir("decrypt")?;
    let input = dir.join("firmware.bin");
    let output = dir.join("firmware.dec");

    let data = b"TAP-in lens firmware";
    let mut image = vec![0_u8; tapin::BLOCK_HEADER_LEN];
    image[64..68].copy_from_slice(&u32::try_from(data.len())?.to_le_bytes());
    image[70..72].copy_from_slice(&tapin::crc16(data));
    image.extend_from_slice(data);
    tapin::CipherState::new(tapin::derive_working_key(DEVICE_KEY)?).apply(&mut image);
    fs::write(&input, &image)?;

    let args = tapin::Args::new(tapin::Command::Decrypt(tapin::DecryptArgs::with_key(
        &input, &output, DEVICE_KEY,
    )))
    .with_format(tapin::OutputFormat::Json);
    let stdout = run_with_parsed_args(args).await?;

    let value: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(Some(u64::try_from(image.len())?), value["input_bytes"].as_u64());
    let decrypted = fs::read(&output)?;
    assert_eq!(data.to_vec(), decrypted[tapin::BLOCK_HEADER_LEN..].to_vec());

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn decrypt_command_rejects_two_key_sources() {
    let error = tapin::Args::try_parse_from([
        "tapin",
        "decrypt",
        "--input",
        "in.bin",
        "--output",
        "out.bin",
        "--key",
        DEVICE_KEY,
        "--lens-xml",
        "lensinfo_F013N0.xml",
    ])
    .expect_err("key and lens-xml conflict");
    assert_eq!(ErrorKind::ArgumentConflict, error.kind());
}

#[test]
fn decode_command_requires_a_chunk() {
    let error = tapin::Args::try_parse_from(["tapin", "decode"])
        .expect_err("at least one chunk is required");
    assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
}
