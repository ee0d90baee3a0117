crate::system_test_cases!({
    args: &[],
    expected_stdout: "hello from include\n",
    expected_stderr: "make: INFO  | echo hello from include\n",
    expected_files: &[],
});
