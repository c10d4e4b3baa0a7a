/// Instruction block placed before the source lines.
pub const PROMPT_HEADER: &str = "你是一个专业的Minecraft游戏翻译专家，擅长将游戏文本翻译成简体中文。\n\
请将下面每一行Minecraft游戏或MOD中的英文（或其他非中文语言）文本翻译成简体中文。\n\
\n\
要求：\n\
1. 保持Minecraft的游戏术语风格，物品、生物等名称优先使用官方中文译名\n\
2. 原样保留格式标记和占位符，例如 %s、%d、%1$s、{0}、$1、§a\n\
3. 不要翻译命令名称和技术标识符\n\
4. 每一行输入对应输出一行译文，顺序与输入完全一致\n\
5. 只输出译文，不要添加序号、原文、解释或任何说明\n\
\n\
需要翻译的文本：\n";

/// Reminder placed after the source lines.
pub const PROMPT_FOOTER: &str = "\n请按照原文顺序，直接输出翻译结果，每行一个翻译：";

/// Renders one batch into a prompt: header, one source value per line, footer.
/// Line position is the only link between a source value and its translation,
/// so line breaks inside a value are written as the escapes `\n` and `\r`.
pub fn render_prompt(sources: &[String]) -> String {
    let body_len: usize = sources.iter().map(|source| source.len() + 2).sum();
    let mut prompt = String::with_capacity(PROMPT_HEADER.len() + body_len + PROMPT_FOOTER.len());

    prompt.push_str(PROMPT_HEADER);
    for source in sources {
        prompt.push_str(&escape_line_breaks(source));
        prompt.push('\n');
    }
    prompt.push_str(PROMPT_FOOTER);
    prompt
}

pub fn has_line_break(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

/// Writes `\n` and `\r` as two-character escapes so the value fits on one line.
pub fn escape_line_breaks(value: &str) -> String {
    value.replace('\r', "\\r").replace('\n', "\\n")
}

/// Reverses [`escape_line_breaks`].
pub fn restore_line_breaks(value: &str) -> String {
    value.replace("\\r", "\r").replace("\\n", "\n")
}
