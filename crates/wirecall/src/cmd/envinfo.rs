use std::collections::BTreeMap;

use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    version: String,
    protocol: String,
    target: String,
    rust_version: String,
    git_hash: String,
    platform: PlatformInfo,
    dependencies: BTreeMap<String, String>,
    environment: BTreeMap<String, Option<String>>,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut deps = BTreeMap::new();
    deps.insert("clap".to_string(), "4.5".to_string());
    deps.insert("bytes".to_string(), "1".to_string());
    deps.insert("serde_json".to_string(), "1".to_string());

    let mut env = BTreeMap::new();
    env.insert("RUST_LOG".to_string(), std::env::var("RUST_LOG").ok());

    let output = EnvInfoOutput {
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol: format!(
            "{}.{}",
            wirecall_codec::PROTOCOL_VERSION.0,
            wirecall_codec::PROTOCOL_VERSION.1
        ),
        target: target_triple(),
        rust_version: option_env!("RUSTC_VERSION")
            .unwrap_or("unknown")
            .to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        platform: PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
        dependencies: deps,
        environment: env,
    };

    print_envinfo(&output, format);
    Ok(SUCCESS)
}

fn target_triple() -> String {
    if let Some(target) = option_env!("WIRECALL_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn print_envinfo(output: &EnvInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("wirecall environment\n");
            println!("  Version:    {}", output.version);
            println!("  Protocol:   {}", output.protocol);
            println!("  Target:     {}", output.target);
            println!("  Rust:       {}", output.rust_version);
            println!("  Git hash:   {}", output.git_hash);
            println!(
                "  Platform:   {} ({})",
                output.platform.os, output.platform.arch
            );
            println!("\n  Dependencies:");
            for (k, v) in &output.dependencies {
                println!("    {:<12} {}", k, v);
            }
            println!("\n  Environment:");
            for (k, v) in &output.environment {
                println!("    {:<20} {}", k, v.as_deref().unwrap_or("(not set)"));
            }
        }
        OutputFormat::Raw => println!("{}", output.version),
    }
}
