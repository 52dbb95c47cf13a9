use std::collections::HashMap;
use std::error::Error;
use std::fs;

use draw_geom::incircle;
use draw_parse::{CorrectionPolicy, extract_json, parse_drawing, resolve_unit};

type DynError = Box<dyn Error>;
type Flags = HashMap<String, String>;

fn main() -> Result<(), DynError> {
    env_logger::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "parse" => run_parse(&args[1..]),
        "extract" => run_extract(&args[1..]),
        "unit" => run_unit(&args[1..]),
        "incircle" => run_incircle(&args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn run_parse(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let response = fs::read_to_string(required_str(&flags, "--response-file")?)?;
    let query = required_str(&flags, "--query")?;
    let policy = parse_policy(optional_str(&flags, "--policy", "only-if-requested"))?;

    let drawing = parse_drawing(&response, query, policy)?;
    println!("{}", serde_json::to_string_pretty(&drawing)?);
    Ok(())
}

fn run_extract(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let response = fs::read_to_string(required_str(&flags, "--response-file")?)?;

    let value = extract_json(&response)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_unit(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    println!("{}", resolve_unit(required_str(&flags, "--query")?));
    Ok(())
}

fn run_incircle(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let a = [required_f64(&flags, "--ax")?, required_f64(&flags, "--ay")?];
    let b = [required_f64(&flags, "--bx")?, required_f64(&flags, "--by")?];
    let c = [required_f64(&flags, "--cx")?, required_f64(&flags, "--cy")?];

    let result = incircle(a, b, c)?;
    println!("center {} {}", result.center[0], result.center[1]);
    println!("radius {}", result.radius);
    Ok(())
}

fn parse_policy(name: &str) -> Result<CorrectionPolicy, DynError> {
    match name {
        "always-if-triangle" => Ok(CorrectionPolicy::AlwaysIfTriangle),
        "only-if-mismatched" => Ok(CorrectionPolicy::OnlyIfMismatched),
        "only-if-requested" => Ok(CorrectionPolicy::OnlyIfRequested),
        _ => Err(format!("unknown policy: {name}").into()),
    }
}

fn parse_flags(args: &[String]) -> Result<Flags, DynError> {
    if !args.len().is_multiple_of(2) {
        return Err("expected flag-value pairs".into());
    }

    let mut flags = HashMap::new();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        if !flag.starts_with("--") {
            return Err(format!("expected flag at position {}", index + 1).into());
        }
        let value = args[index + 1].clone();
        if flags.insert(flag.to_string(), value).is_some() {
            return Err(format!("duplicate flag: {flag}").into());
        }
        index += 2;
    }
    Ok(flags)
}

fn required_str<'a>(flags: &'a Flags, key: &str) -> Result<&'a str, DynError> {
    flags
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing required {key}").into())
}

fn required_f64(flags: &Flags, key: &str) -> Result<f64, DynError> {
    required_str(flags, key)?
        .parse::<f64>()
        .map_err(|err| format!("invalid float for {key}: {err}").into())
}

fn optional_str<'a>(flags: &'a Flags, key: &str, default: &'a str) -> &'a str {
    flags.get(key).map(String::as_str).unwrap_or(default)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  draw-cli parse --response-file <path> --query <text> [--policy <always-if-triangle|only-if-mismatched|only-if-requested>]"
    );
    eprintln!("  draw-cli extract --response-file <path>");
    eprintln!("  draw-cli unit --query <text>");
    eprintln!(
        "  draw-cli incircle --ax <f64> --ay <f64> --bx <f64> --by <f64> --cx <f64> --cy <f64>"
    );
}

#[cfg(test)]
mod tests {
    use super::{parse_flags, parse_policy, required_f64, run_parse};
    use draw_parse::CorrectionPolicy;

    #[test]
    fn parses_flag_pairs() {
        let args = vec![
            "--query".to_string(),
            "draw a circle".to_string(),
            "--policy".to_string(),
            "only-if-mismatched".to_string(),
        ];
        let flags = parse_flags(&args).expect("should parse flag pairs");
        assert_eq!(flags.get("--query").map(String::as_str), Some("draw a circle"));
        assert_eq!(
            flags.get("--policy").map(String::as_str),
            Some("only-if-mismatched")
        );
    }

    #[test]
    fn rejects_dangling_flag() {
        let args = vec!["--query".to_string()];
        assert!(parse_flags(&args).is_err());
    }

    #[test]
    fn parses_every_policy_name() {
        assert_eq!(
            parse_policy("always-if-triangle").expect("policy should parse"),
            CorrectionPolicy::AlwaysIfTriangle
        );
        assert_eq!(
            parse_policy("only-if-mismatched").expect("policy should parse"),
            CorrectionPolicy::OnlyIfMismatched
        );
        assert_eq!(
            parse_policy("only-if-requested").expect("policy should parse"),
            CorrectionPolicy::OnlyIfRequested
        );
        assert!(parse_policy("sometimes").is_err());
    }

    #[test]
    fn parses_required_float() {
        let args = vec!["--ax".to_string(), "2.5".to_string()];
        let flags = parse_flags(&args).expect("flag parsing should succeed");
        let ax = required_f64(&flags, "--ax").expect("required float should parse");
        assert!((ax - 2.5).abs() < 1e-12);
    }

    #[test]
    fn parse_command_reads_a_response_file() {
        let temp_dir = std::env::temp_dir();
        let path = temp_dir.join("draw_cli_parse_test.json");
        std::fs::write(&path, r#"{"shapes": [], "meta": {}}"#)
            .expect("should write test response file");

        let args = vec![
            "--response-file".to_string(),
            path.to_string_lossy().into_owned(),
            "--query".to_string(),
            "draw nothing".to_string(),
        ];
        run_parse(&args).expect("parse command should succeed");

        let _ = std::fs::remove_file(&path);
    }
}
