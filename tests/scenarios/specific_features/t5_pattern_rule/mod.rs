crate::system_test_cases!({
    args: &["a.out"],
    expected_stdout: "building a.out from a.in\n",
    expected_stderr: "make: INFO  | echo \"building a.out from a.in\"\nmake: INFO  | cp a.in a.out\n",
    expected_files: &[("a.out", "hello\n")],
    pre_hook: {
        std::fs::write("tests/scenarios/specific_features/t5_pattern_rule/a.in", "hello\n").unwrap();
    },
    post_hook: {
        std::fs::remove_file("tests/scenarios/specific_features/t5_pattern_rule/a.in").unwrap();
    },
});
