use pretty_assertions::assert_eq;
use treelox::{errors, interpreter::Interpreter, CaptureOutput, CaptureReports, LoxError};

include!(concat!(env!("OUT_DIR"), "/tests/lang.rs"));

fn annotations(pattern: &str, content: &str) -> Vec<String> {
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(false)
        .build()
        .expect("regex should compile correctly");

    re.captures_iter(content)
        .map(|m| m.get(1).expect("annotation should have a value").as_str().trim().to_string())
        .collect()
}

fn run_file(path: &str) -> Result<(), LoxError> {
    let content = std::fs::read(path)?;
    let content = std::str::from_utf8(&content).map_err(|_e| errors::system(
        "The file you provided is not a valid UTF-8 file.",
        "Make sure that the file is a valid UTF-8 file.",
    ))?;

    let expected = annotations(r"//\s*expect: (.*)", content);
    let runtime_errors = annotations(r"//\s*expect runtime error: (.*)", content);
    let static_errors = annotations(r"//\s*Error: (.*)", content);

    let mut errors = Vec::new();

    let lexer = treelox::lexer::Scanner::new(content);
    let (stmts, errs) = treelox::ast::Parser::parse(&mut lexer.inspect(|t| if let Err(e) = t {
        errors.push(e.clone());
    }).filter_map(|t| t.ok()));
    errors.extend(errs);

    let output = CaptureOutput::new();
    let mut interpreter = Interpreter::default()
        .with_output(Box::new(output.clone()))
        .with_reporter(Box::new(CaptureReports::new()));

    if errors.is_empty() {
        errors.extend(interpreter.resolve(&stmts));
    }

    if !static_errors.is_empty() {
        let messages = errors.iter().map(|e| e.message().to_string()).collect::<Vec<_>>();
        for expected in static_errors.iter() {
            assert!(
                messages.iter().any(|m| m == expected),
                "Expected the static error '{}' to be raised in {}, got {:?}",
                expected,
                path,
                messages,
            );
        }

        return Ok(());
    }

    assert!(errors.is_empty(), "Did not expect a static error in {}, got {:?}", path, errors);

    let errs = interpreter.interpret(&stmts);
    let messages = errs.iter().map(|e| e.message().to_string()).collect::<Vec<_>>();
    assert_eq!(runtime_errors, messages, "runtime errors raised by {}", path);

    let actual = output.to_string();
    let actual = actual.lines().collect::<Vec<_>>();
    assert_eq!(expected, actual, "output of {}", path);

    Ok(())
}

#[test]
fn every_fixture_has_expectations() {
    for test_file in walkdir::WalkDir::new("tests/lang").sort_by_file_name() {
        let test_file = test_file.expect("No issues opening the test file");
        if test_file.file_type().is_file() && test_file.path().extension().map(|e| e == "lox").unwrap_or_default() {
            let content = std::fs::read_to_string(test_file.path()).expect("fixtures should be readable");
            assert!(
                content.contains("// expect") || content.contains("// Error:"),
                "{} does not declare any expected output or errors",
                test_file.path().display(),
            );
        }
    }
}
