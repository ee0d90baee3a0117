crate::system_test_cases!({
    args: &["a"],
    expected_stdout: "",
    expected_stderr: "make: ERROR | Circular dependency detected involving target 'a'\n",
    expected_files: &[],
});
