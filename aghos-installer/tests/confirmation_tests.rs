use aghos_core::config_states::EXECUTE_CONFIRMATION;
use aghos_installer::ui::confirm::{confirmation_matches, TypedConfirm};
use aghos_workflow::Confirm;
use anyhow::anyhow;
use std::cell::RefCell;

fn summary() -> Vec<String> {
    vec!["Target: /dev/sda (64.0 GiB, GPT)".to_string()]
}

#[test]
fn exact_phrase_is_accepted() {
    let prompts = RefCell::new(Vec::new());
    let confirm = TypedConfirm::with_reader(|prompt: &str| {
        prompts.borrow_mut().push(prompt.to_string());
        Ok(format!("  {}\n", EXECUTE_CONFIRMATION))
    });

    assert!(confirm.confirm(&summary()).unwrap());
    assert!(prompts.borrow()[0].contains(EXECUTE_CONFIRMATION));
}

#[test]
fn anything_else_declines() {
    let lowercase = EXECUTE_CONFIRMATION.to_lowercase();
    for typed in ["", "yes", "y", lowercase.as_str()] {
        assert!(!confirmation_matches(typed), "{typed:?} must not confirm");
        let answer = typed.to_string();
        let confirm = TypedConfirm::with_reader(move |_prompt: &str| Ok(answer.clone()));
        assert!(!confirm.confirm(&summary()).unwrap());
    }
}

#[test]
fn prompt_errors_propagate() {
    let confirm = TypedConfirm::with_reader(|_prompt: &str| Err(anyhow!("not a terminal")));
    assert!(confirm.confirm(&summary()).is_err());
}
