use screamrouter_config::SpeakerMatrix;

/// Applies an 8x8 speaker remap matrix (row = output channel, column =
/// input channel) to a planar frame, producing `output_channels` planar
/// blocks of the same frame length.
pub fn apply_matrix(
    input: &[Vec<f32>],
    matrix: &SpeakerMatrix,
    output_channels: u8,
) -> Vec<Vec<f32>> {
    let frame_len = input.first().map(|c| c.len()).unwrap_or(0);
    let input_channels = input.len();
    let mut output = vec![vec![0.0f32; frame_len]; output_channels as usize];

    for (out_ch, out_block) in output.iter_mut().enumerate() {
        for sample_index in 0..frame_len {
            let mut acc = 0.0f32;
            for in_ch in 0..input_channels {
                acc += matrix[out_ch][in_ch] * input[in_ch][sample_index];
            }
            out_block[sample_index] = acc;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matrix_passes_through() {
        let mut matrix = [[0.0f32; 8]; 8];
        matrix[0][0] = 1.0;
        matrix[1][1] = 1.0;
        let input = vec![vec![0.5, -0.5], vec![0.25, -0.25]];
        let output = apply_matrix(&input, &matrix, 2);
        assert_eq!(output, input);
    }

    #[test]
    fn mono_downmix_averages_channels() {
        let mut matrix = [[0.0f32; 8]; 8];
        matrix[0][0] = 0.5;
        matrix[0][1] = 0.5;
        let input = vec![vec![1.0, 1.0], vec![0.0, 0.0]];
        let output = apply_matrix(&input, &matrix, 1);
        assert_eq!(output, vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn extra_output_channels_are_silent_when_unmapped() {
        let matrix = [[0.0f32; 8]; 8];
        let input = vec![vec![1.0; 4]];
        let output = apply_matrix(&input, &matrix, 3);
        assert_eq!(output.len(), 3);
        for block in &output {
            assert!(block.iter().all(|&s| s == 0.0));
        }
    }
}
