use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::encoding_name;

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("picmd {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: picmd");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("PICMD_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "default_encoding: {}",
        encoding_name(picmd_frame::FieldEncoding::default())
    );
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
