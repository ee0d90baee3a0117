crate::system_test_cases!({
    args: &["-j", "3"],
    expected_stdout: "?",
    expected_stderr: "?",
    expected_files: &[("a", ""), ("b", ""), ("c", "")],
});
