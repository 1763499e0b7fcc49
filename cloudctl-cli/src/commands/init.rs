//! `cloudctl init` - shell integration snippet.

use anyhow::Result;

pub async fn run() -> Result<()> {
    let shell = detect_shell();

    println!("# CloudCtl shell integration for {shell}");
    println!("# Add this to your shell config file:");
    println!("#   Bash: ~/.bashrc or ~/.bash_profile");
    println!("#   Zsh:  ~/.zshrc");
    println!("#   Fish: ~/.config/fish/config.fish");
    println!();

    match shell.as_str() {
        "fish" => print_fish(),
        _ => print_bash_zsh(),
    }
    Ok(())
}

fn detect_shell() -> String {
    let shell = std::env::var("SHELL").unwrap_or_default();
    if shell.is_empty() {
        return if cfg!(windows) { "powershell" } else { "bash" }.to_string();
    }
    shell
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("bash")
        .to_string()
}

fn print_bash_zsh() {
    println!(
        r#"# Set your CloudCtl encryption secret
export CLOUDCTL_SECRET="your-32-char-encryption-key"

# Quick switch function - usage: ccs <profile>
ccs() {{
  if [ -z "$1" ]; then
    eval $(cloudctl switch)
  else
    eval $(cloudctl switch "$1")
  fi
}}

# Show current session in prompt (optional)
cloudctl_prompt() {{
  cloudctl prompt 2>/dev/null
}}

# Add to your PS1 (Bash) or PROMPT (Zsh):
# PS1='$(cloudctl_prompt) \u@\h:\w\$ '
# PROMPT='$(cloudctl_prompt) %n@%m:%~%# '

# Aliases for common commands
alias ccl='cloudctl login'
alias ccst='cloudctl status'
alias ccr='cloudctl refresh'
alias ccc='cloudctl console'
alias ccm='cloudctl mfa-login'"#
    );
}

fn print_fish() {
    println!(
        r#"# Set your CloudCtl encryption secret
set -gx CLOUDCTL_SECRET "your-32-char-encryption-key"

# Quick switch function - usage: ccs <profile>
function ccs
    if test (count $argv) -eq 0
        eval (cloudctl switch)
    else
        eval (cloudctl switch $argv[1])
    end
end

# Show current session in prompt (optional)
function cloudctl_prompt
    cloudctl prompt 2>/dev/null
end

# Aliases for common commands
alias ccl='cloudctl login'
alias ccst='cloudctl status'
alias ccr='cloudctl refresh'
alias ccc='cloudctl console'
alias ccm='cloudctl mfa-login'"#
    );
}
